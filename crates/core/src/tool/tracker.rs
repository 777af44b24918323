use std::fmt;

/// Tracks the tool call round trip within a generation step.
///
/// Every call issued by the model moves through a two-state machine:
/// issued, then resolved. A next step must not be submitted while any
/// call is still issued.
#[derive(Clone, Default)]
pub struct RoundTripTracker {
    calls: Vec<Call>,
}

#[derive(Clone)]
struct Call {
    id: String,
    resolved: bool,
}

impl RoundTripTracker {
    /// Creates an empty tracker.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call issued by the model. Issuing an id twice is a
    /// no-op.
    pub fn issue<S: Into<String>>(&mut self, id: S) {
        let id = id.into();
        if self.calls.iter().any(|call| call.id == id) {
            return;
        }
        self.calls.push(Call {
            id,
            resolved: false,
        });
    }

    /// Marks a call as resolved.
    ///
    /// The first resolution wins: resolving an already resolved call,
    /// or an id that was never issued, is a no-op and returns `false`.
    pub fn resolve(&mut self, id: &str) -> bool {
        let Some(call) =
            self.calls.iter_mut().find(|call| call.id == id)
        else {
            debug!("resolution for an unknown call: {id}");
            return false;
        };
        if call.resolved {
            debug!("repeated resolution for call: {id}");
            return false;
        }
        call.resolved = true;
        true
    }

    /// Returns the id of the earliest issued call that has not been
    /// resolved yet.
    pub fn first_unresolved(&self) -> Option<&str> {
        self.calls
            .iter()
            .find(|call| !call.resolved)
            .map(|call| call.id.as_str())
    }

    /// Whether every issued call has been resolved.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.first_unresolved().is_none()
    }
}

impl fmt::Debug for RoundTripTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unresolved =
            self.calls.iter().filter(|call| !call.resolved).count();
        f.debug_struct("RoundTripTracker")
            .field("calls", &self.calls.len())
            .field("unresolved", &unresolved)
            .finish()
    }
}
