#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    #[error("handler already registered: handler={handler}")]
    AlreadyRegistered { handler: &'static str },
}
