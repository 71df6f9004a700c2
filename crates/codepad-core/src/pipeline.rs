//! Language to build/run pipeline mapping.
//!
//! Pipelines are command templates: `{workspace}` stands for the workspace directory
//! as seen by the backend running the step (the host path for native execution,
//! the bind-mount target inside a container).

use crate::language::Language;
use crate::workspace::Workspace;
use std::collections::HashMap;

pub const WORKSPACE_PLACEHOLDER: &str = "{workspace}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Compile,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub program: String,
    pub args: Vec<String>,
    /// Attach the staged input file as stdin.
    pub attach_stdin: bool,
}

impl Step {
    /// Free-form step; `attach_stdin` should only be set on the last step.
    pub fn new(kind: StepKind, program: &str, args: &[&str], attach_stdin: bool) -> Self {
        Self {
            kind,
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            attach_stdin,
        }
    }

    fn compile(program: &str, args: Vec<String>) -> Self {
        Self {
            kind: StepKind::Compile,
            program: program.to_string(),
            args,
            attach_stdin: false,
        }
    }

    fn run(program: &str, args: Vec<String>) -> Self {
        Self {
            kind: StepKind::Run,
            program: program.to_string(),
            args,
            attach_stdin: true,
        }
    }

    /// Program and arguments with the workspace placeholder substituted.
    pub fn resolve(&self, workspace_dir: &str) -> (String, Vec<String>) {
        let program = self.program.replace(WORKSPACE_PLACEHOLDER, workspace_dir);
        let args = self
            .args
            .iter()
            .map(|a| a.replace(WORKSPACE_PLACEHOLDER, workspace_dir))
            .collect();
        (program, args)
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub language: Language,
    pub steps: Vec<Step>,
    /// Image used when the pipeline runs in a container.
    pub image: &'static str,
    /// Extra environment for containerized steps.
    pub env: HashMap<String, String>,
}

impl Pipeline {
    /// Builds the pipeline for a staged workspace.
    pub fn for_workspace(workspace: &Workspace) -> Self {
        Self::select(
            workspace.language(),
            workspace.source_file(),
            workspace.entry_point(),
        )
    }

    /// Pure mapping from language and staged names to steps.
    ///
    /// `entry_point` is only consulted for Java; when it is absent the class name is
    /// derived from the source file name.
    pub fn select(language: Language, source_file: &str, entry_point: Option<&str>) -> Self {
        let src = format!("{}/{}", WORKSPACE_PLACEHOLDER, source_file);
        let binary = format!("{}/main", WORKSPACE_PLACEHOLDER);
        let mut env = HashMap::new();

        let steps = match language {
            Language::Python => vec![Step::run("python3", vec![src])],
            Language::C => vec![
                Step::compile("gcc", vec![src, "-o".to_string(), binary.clone()]),
                Step::run(&binary, vec![]),
            ],
            Language::Cpp => vec![
                Step::compile("g++", vec![src, "-o".to_string(), binary.clone()]),
                Step::run(&binary, vec![]),
            ],
            Language::Java => {
                let class_name = entry_point
                    .map(str::to_string)
                    .unwrap_or_else(|| source_file.trim_end_matches(".java").to_string());
                env.insert("JAVA_FILE".to_string(), source_file.to_string());
                env.insert("JAVA_CLASS".to_string(), class_name.clone());
                vec![
                    Step::compile("javac", vec![src]),
                    Step::run(
                        "java",
                        vec![
                            "-cp".to_string(),
                            WORKSPACE_PLACEHOLDER.to_string(),
                            class_name,
                        ],
                    ),
                ]
            }
        };

        Self {
            language,
            steps,
            image: language.container_image(),
            env,
        }
    }

    /// A pipeline from explicit steps, mainly for tooling and tests.
    pub fn custom(language: Language, steps: Vec<Step>) -> Self {
        Self {
            language,
            steps,
            image: language.container_image(),
            env: HashMap::new(),
        }
    }

    pub fn is_final(&self, index: usize) -> bool {
        index + 1 == self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_runs_interpreter_directly() {
        let p = Pipeline::select(Language::Python, "main.py", None);
        assert_eq!(p.steps.len(), 1);
        assert_eq!(p.steps[0].kind, StepKind::Run);
        assert_eq!(p.steps[0].display(), "python3 {workspace}/main.py");
        assert!(p.steps[0].attach_stdin);
        assert_eq!(p.image, "python-runner");
    }

    #[test]
    fn c_and_cpp_compile_then_run() {
        for (lang, compiler, file) in [(Language::C, "gcc", "main.c"), (Language::Cpp, "g++", "main.cpp")] {
            let p = Pipeline::select(lang, file, None);
            assert_eq!(p.steps.len(), 2);
            assert_eq!(p.steps[0].kind, StepKind::Compile);
            assert_eq!(p.steps[0].program, compiler);
            assert!(!p.steps[0].attach_stdin);
            assert_eq!(p.steps[1].kind, StepKind::Run);
            assert_eq!(p.steps[1].program, "{workspace}/main");
            assert!(p.steps[1].attach_stdin);
        }
    }

    #[test]
    fn java_uses_entry_point_and_classpath() {
        let p = Pipeline::select(Language::Java, "Solver.java", Some("Solver"));
        assert_eq!(p.steps[0].display(), "javac {workspace}/Solver.java");
        assert_eq!(p.steps[1].display(), "java -cp {workspace} Solver");
        assert_eq!(p.env.get("JAVA_FILE").map(String::as_str), Some("Solver.java"));
        assert_eq!(p.env.get("JAVA_CLASS").map(String::as_str), Some("Solver"));
        assert_eq!(p.image, "java-runner");
    }

    #[test]
    fn resolve_substitutes_workspace() {
        let p = Pipeline::select(Language::C, "main.c", None);
        let (program, args) = p.steps[0].resolve("/app");
        assert_eq!(program, "gcc");
        assert_eq!(args, vec!["/app/main.c", "-o", "/app/main"]);
        let (program, _) = p.steps[1].resolve("/tmp/ws");
        assert_eq!(program, "/tmp/ws/main");
    }

    #[test]
    fn last_step_is_final() {
        let p = Pipeline::select(Language::Java, "A.java", Some("A"));
        assert!(!p.is_final(0));
        assert!(p.is_final(1));
    }
}
