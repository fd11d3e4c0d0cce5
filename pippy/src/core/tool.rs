//! Tool descriptors used to verify presence of, and install, a dependency.

/// Locates a module without importing it; exit status 0 means importable.
pub const MODULE_CHECK: &str =
    "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)";

/// How to decide whether a tool is already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// The resolved executable is a direct path to a real file.
    Executable,
    /// `module` is importable by the environment's interpreter.
    ModuleImport { module: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Name used for resolution and messages.
    pub name: String,
    /// Identifier handed to the package installer.
    pub package: String,
    pub capability: Capability,
}

impl ToolSpec {
    /// Tool verified by finding its executable stub.
    pub fn executable(name: &str, package: &str) -> Self {
        Self {
            name: name.to_string(),
            package: package.to_string(),
            capability: Capability::Executable,
        }
    }

    /// Tool verified by importing `module`.
    pub fn importable(name: &str, package: &str, module: &str) -> Self {
        Self {
            name: name.to_string(),
            package: package.to_string(),
            capability: Capability::ModuleImport {
                module: module.to_string(),
            },
        }
    }

    pub fn pipreqs() -> Self {
        Self::executable("pipreqs", "pipreqs")
    }

    pub fn build() -> Self {
        Self::importable("build", "build", "build")
    }

    pub fn twine() -> Self {
        Self::executable("twine", "twine")
    }
}

/// Interpreter arguments that check for `module` via [`MODULE_CHECK`].
///
/// The module name travels as `sys.argv[1]`, never spliced into the source.
pub fn module_check_args(module: &str) -> Vec<String> {
    vec![
        "-c".to_string(),
        MODULE_CHECK.to_string(),
        module.to_string(),
    ]
}
