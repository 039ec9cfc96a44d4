use crate::config::Config;
use crate::issue::Issuer;
use crate::pdf::PdfRenderer;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<Issuer<PdfRenderer>>,
    pub config: Arc<Config>,
    /// Flips to `true` once loading has finished and the store is initialized.
    pub ready: watch::Receiver<bool>,
}

impl AppState {
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}
