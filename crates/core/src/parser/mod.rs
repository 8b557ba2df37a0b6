pub mod project;
pub mod safety;
pub mod solution;

pub use project::{
    ProjectFileInfo, ProjectManifestData, load_project_file, parse_project_manifest,
    parse_target_frameworks, read_project_manifest,
};
pub use solution::{
    NestingEdge, ProjectRecord, ROOT_KEY, SOLUTION_FOLDER_TYPE_GUID, Section, SectionTiming,
    SolutionManifest, build_project_hierarchy, enrich_target_frameworks, load_solution,
    parse_solution,
};
