use derive_more::Display;

/// A rejected status change on one of the lifecycle entities.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(fmt = "Cannot move {} from '{}' to '{}': {}", entity, from, to, reason)]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
    pub reason: String,
}

impl TransitionError {
    pub fn new(
        entity: &'static str,
        from: impl AsRef<str>,
        to: impl AsRef<str>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entity,
            from: from.as_ref().to_string(),
            to: to.as_ref().to_string(),
            reason: reason.into(),
        }
    }
}

impl std::error::Error for TransitionError {}
