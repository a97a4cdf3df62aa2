use tender_core::Config;

use crate::pipeline::Pipeline;

pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
}
