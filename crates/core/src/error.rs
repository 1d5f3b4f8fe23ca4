use dispense_types::InputError;

#[derive(Debug, thiserror::Error)]
pub enum DispenseError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A quantity or dose edit carried a value that is not a non-negative number.
    ///
    /// The record keeps its previous value; the message is meant for a field-level
    /// validation hint.
    #[error("{field}: {source}")]
    InvalidNumericInput {
        field: &'static str,
        #[source]
        source: InputError,
    },

    #[error("the current user may not modify dispense details")]
    NotPermitted,

    #[error("no dispense record at position {0}")]
    RecordNotFound(usize),

    #[error("dispense record was discarded")]
    StaleHandle,

    #[error("failed to read config file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(String),

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
}

pub type DispenseResult<T> = std::result::Result<T, DispenseError>;
