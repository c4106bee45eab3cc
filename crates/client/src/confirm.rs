/// Asks the user to confirm a destructive action.
///
/// Implemented for any `Fn(&str) -> bool`, so a closure works as a gate.
pub trait ConfirmGate {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> ConfirmGate for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Gate that always answers the same way. Useful for scripted callers.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmGate for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}
