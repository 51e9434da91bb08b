macro_rules! create_scalecheck_env {
    ($name: literal) => {
        concat!("SCALECHECK_", $name)
    };
}

/// Prefix of variables that disable a test stage (`SKIP_apply`, `SKIP_teardown`, ...).
pub const SKIP_STAGE_PREFIX: &str = "SKIP_";

/// Known environment variables
pub const PROJECT_ID: &str = "PROJECT_ID";
pub const REGION: &str = "REGION";
pub const SCALECHECK_DEBUG: &str = create_scalecheck_env!("DEBUG");
pub const SCALECHECK_TERRAFORM: &str = create_scalecheck_env!("TERRAFORM");
pub const SCALECHECK_GCLOUD: &str = create_scalecheck_env!("GCLOUD");

pub fn skip_stage_env(stage: &str) -> String {
    format!("{SKIP_STAGE_PREFIX}{stage}")
}
