use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerateError {
    #[error("invalid OpenAPI document: {reason}")]
    InvalidDocument { reason: String },

    #[error("trigger `{trigger}` is missing the required `endpoint` setting")]
    MissingEndpoint { trigger: String },

    #[error("trigger `{trigger}` references endpoint `{endpoint}` which is not in the document")]
    UnknownEndpoint { trigger: String, endpoint: String },

    #[error("visible trigger `{trigger}` needs a `title` starting with \"{phrase}\"")]
    MissingTitle {
        trigger: String,
        phrase: &'static str,
    },

    #[error("title of trigger `{trigger}` must start with \"{phrase}\", got \"{title}\"")]
    InvalidTitle {
        trigger: String,
        title: String,
        phrase: &'static str,
    },

    #[error("`fieldDefaults` of `{operation}` names field `{field}` which does not exist")]
    UnknownDefaultField { operation: String, field: String },

    #[error(
        "`simplify.additionalProperties` of `{operation}` names property `{property}` which is not in the request body schema"
    )]
    UnknownAdditionalProperty { operation: String, property: String },

    #[error("`simplify.arrayField` of `{operation}` names `{field}` which is not an array property of the request body")]
    UnknownArrayField { operation: String, field: String },

    #[error("`simplify.itemSchema` of `{operation}` names schema `{schema}` which cannot be resolved")]
    UnknownItemSchema { operation: String, schema: String },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    #[error("missing value for path parameter `{name}`")]
    MissingPathParam { name: String },

    #[error("input `{field}` must be an object")]
    GroupNotObject { field: String },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in config file: {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("failed to read document: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch document: {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{location} is not a usable OpenAPI document")]
    Invalid {
        location: String,
        #[source]
        source: GenerateError,
    },
}
