use std::fmt;

/// The state reported by a component, or by the unit as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Ready,
    Blocked(String),
    Waiting(String),
    Maintenance(String),
}

// === impl Status ===

impl Status {
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::Blocked(message.into())
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        Self::Waiting(message.into())
    }

    pub fn maintenance(message: impl Into<String>) -> Self {
        Self::Maintenance(message.into())
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// The name the platform uses for this kind of status. A ready unit is
    /// reported as `active`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "active",
            Self::Blocked(_) => "blocked",
            Self::Waiting(_) => "waiting",
            Self::Maintenance(_) => "maintenance",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Ready => "",
            Self::Blocked(m) | Self::Waiting(m) | Self::Maintenance(m) => m,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str(self.kind()),
            _ => write!(f, "{}: {}", self.kind(), self.message()),
        }
    }
}
