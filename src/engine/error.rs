#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Cancellation selection empty, outside the booking, already excluded,
    /// or the day's reserved window has already begun.
    NoCancellableDates,
    /// Supplied password does not match the booking's shared secret.
    BadPassword,
    /// Password is not exactly five ASCII digits.
    InvalidPassword,
    /// Booking start date after end date.
    InvalidDateRange,
    /// Venue not in the fixed catalog.
    UnknownVenue(String),
    /// Borrow/return selection is empty.
    EmptySelection,
    /// Item id not in the fixed catalog.
    UnknownItem(String),
    /// Item is already out in another open session.
    ItemUnavailable(String),
    /// Item already has a return record in this session.
    AlreadyReturned(String),
    /// Tool-category item returned without condition photos.
    MissingPhotos(String),
    /// More evidence photos than the per-item cap.
    TooManyPhotos(String),
    /// Image payload exceeds the size bound or is not valid base64.
    BadImage(String),
    /// No booking/session with that id.
    NotFound(String),
    /// A previous mutation on this entity has not settled yet.
    MutationInFlight(String),
    /// Network failure or an error-status response from the remote.
    Remote(String),
    /// Malformed payload at the remote boundary.
    Parse(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NoCancellableDates => write!(f, "no cancellable dates selected"),
            EngineError::BadPassword => write!(f, "wrong cancellation password"),
            EngineError::InvalidPassword => write!(f, "password must be five digits"),
            EngineError::InvalidDateRange => write!(f, "start date after end date"),
            EngineError::UnknownVenue(v) => write!(f, "unknown venue: {v}"),
            EngineError::EmptySelection => write!(f, "empty selection"),
            EngineError::UnknownItem(id) => write!(f, "unknown item: {id}"),
            EngineError::ItemUnavailable(id) => write!(f, "item already borrowed: {id}"),
            EngineError::AlreadyReturned(id) => write!(f, "item already returned: {id}"),
            EngineError::MissingPhotos(id) => {
                write!(f, "tool item {id} requires at least one photo")
            }
            EngineError::TooManyPhotos(id) => write!(f, "too many photos for item: {id}"),
            EngineError::BadImage(msg) => write!(f, "bad image payload: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::MutationInFlight(id) => {
                write!(f, "mutation already in flight for: {id}")
            }
            EngineError::Remote(msg) => write!(f, "remote error: {msg}"),
            EngineError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
