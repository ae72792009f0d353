use crate::error::TeardownFailure;

type Deletion = Box<dyn FnOnce() -> crate::Result<()> + Send>;

/// A stack which is used to delete objects in order
#[derive(Default)]
pub struct DeletionStack {
    stack: Vec<(String, Deletion)>,
}

impl std::fmt::Debug for DeletionStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stack.iter().map(|(label, _)| label))
            .finish()
    }
}

impl DeletionStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Adds item onto the stack
    pub fn push<T>(&mut self, label: impl Into<String>, func: T)
    where
        T: FnOnce() -> crate::Result<()> + Send + 'static,
    {
        self.stack.push((label.into(), Box::new(func)));
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs every deletion, newest first.
    ///
    /// A failing deletion is logged and the rest still run.
    pub fn flush(&mut self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();
        while let Some((label, element)) = self.stack.pop() {
            if let Err(error) = element() {
                tracing::error!("Failed to destroy {label}: {error}");
                failures.push(TeardownFailure {
                    object: label,
                    error,
                });
            }
        }
        failures
    }
}
