use clap::Parser;

/// Command-line args: source bucket/prefix, optional destination bucket/prefix
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bucketmerge",
    about = "Merge date-stamped CSV objects into one merged.csv per month"
)]
pub struct Args {
    /// Source bucket name, or a store URL (s3://bucket, file:///dir, memory://)
    #[arg(long, env = "MERGE_BUCKET")]
    pub bucket: String,

    /// Key prefix to list source objects under
    #[arg(long, env = "MERGE_PREFIX")]
    pub prefix: String,

    /// Bucket to upload merged files to, defaults to input bucket
    #[arg(long = "output_bucket", alias = "output-bucket", env = "MERGE_OUTPUT_BUCKET")]
    pub output_bucket: Option<String>,

    /// Prefix to upload merged files under, defaults to input prefix
    #[arg(long = "output_prefix", alias = "output-prefix", env = "MERGE_OUTPUT_PREFIX")]
    pub output_prefix: Option<String>,
}

/// A container (bucket) plus a key prefix inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub container: String,
    pub prefix: String,
}

impl ObjectLocation {
    pub fn new(container: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            prefix: prefix.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub source: ObjectLocation,
    pub destination: ObjectLocation,
}

impl MergeConfig {
    pub fn from_args(args: Args) -> Self {
        let output_bucket = args.output_bucket.unwrap_or_else(|| args.bucket.clone());
        let output_prefix = args.output_prefix.unwrap_or_else(|| args.prefix.clone());
        Self {
            source: ObjectLocation::new(args.bucket, args.prefix),
            destination: ObjectLocation::new(output_bucket, output_prefix),
        }
    }

    pub fn same_container(&self) -> bool {
        self.source.container == self.destination.container
    }
}
