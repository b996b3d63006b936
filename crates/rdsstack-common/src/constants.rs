//! System-wide constants and default values.

/// TCP port the MySQL-compatible cluster listens on.
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Port string emitted when the endpoint address carries no port.
pub const DEFAULT_DB_PORT_STR: &str = "3306";

/// Environment variable holding the target account.
pub const ENV_ACCOUNT: &str = "CDK_DEFAULT_ACCOUNT";

/// Environment variable holding the target region.
pub const ENV_REGION: &str = "CDK_DEFAULT_REGION";

/// Environment variable pointing at the instance configuration file.
pub const ENV_CONFIG_FILE: &str = "RDS_CONFIG_FILE";

/// Configuration file used when neither a flag nor the env var is set.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Context file holding cached lookup results.
pub const DEFAULT_CONTEXT_FILE: &str = "cdk.context.json";

/// Output directory for the synthesized cloud assembly.
pub const DEFAULT_OUTDIR: &str = "cdk.out";

/// Name prefix shared by every construct of the basic stack.
pub const BASIC_NAME_PREFIX: &str = "AcornRdsCluster";

/// Stack name of the basic program.
pub const BASIC_STACK_NAME: &str = "bill";

/// VPC the basic program deploys into.
pub const BASIC_VPC_ID: &str = "vpc-0a95e30e5c79ce188";

/// Admin username of the basic program.
pub const BASIC_ADMIN_USERNAME: &str = "clusteradmin";

/// Tag key marking resources owned by the basic stack.
pub const BASIC_OWNER_TAG: &str = "AcornSVC";

/// Stack name of the serverless-v2 program.
pub const SERVERLESS_V2_STACK_NAME: &str = "Stack";

/// Idle minutes before the basic cluster pauses.
pub const AUTO_PAUSE_MINUTES: u64 = 10;

/// Lower capacity bound (ACUs) forced onto the serverless-v2 cluster.
pub const SERVERLESS_V2_MIN_CAPACITY: f64 = 0.5;

/// Upper capacity bound (ACUs) forced onto the serverless-v2 cluster.
pub const SERVERLESS_V2_MAX_CAPACITY: f64 = 2.0;

/// Binary name for the CLI.
pub const BIN_NAME: &str = "rdsstack";

/// Cloud assembly schema version written to `manifest.json`.
pub const ASSEMBLY_VERSION: &str = "36.0.0";
