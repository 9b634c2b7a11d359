use thiserror::Error;

#[derive(Error, Debug)]
pub enum BraidError {
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("configuration has no port")]
    MissingPort,

    #[error("{0} has no hosts")]
    EmptyHostGroup(String),

    #[error("{group}: {host} has no port specified")]
    MalformedHost { group: String, host: String },

    #[error("{graph}: unknown hosts group: {group}")]
    UnknownHostGroup { graph: String, group: String },

    #[error("{graph}: service already present: {service}")]
    DuplicateService { graph: String, service: String },

    #[error("{graph}: {service} depends on itself")]
    SelfDependency { graph: String, service: String },

    #[error("{graph}: unknown service in dependency: {service}")]
    UnknownService { graph: String, service: String },

    #[error("{0}: cycle in dependencies")]
    DependencyCycle(String),

    #[error("route {route} references unknown graph: {graph}")]
    UnknownGraphInRoute { route: String, graph: String },

    #[error("downstream connection failed: {0}")]
    DownstreamConnect(String),

    #[error("downstream request timed out after {0}ms")]
    DownstreamTimeout(u64),

    #[error("downstream replied with status {0}")]
    DownstreamStatus(u16),

    #[error("payload size {0} exceeds maximum allowed size {1}")]
    PayloadTooLarge(usize, usize),

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BraidError>;
