pub mod batoto;
pub mod mangadex;

use std::sync::Arc;

use crate::config::Config;
use crate::core::source::Source;
use crate::engine::Orchestrator;
use crate::utils::http::Fetcher;

pub use batoto::BatotoSource;
pub use mangadex::MangaDexSource;

/// Orchestrator preloaded with every built-in source
pub fn builtin_orchestrator(config: &Config, fetcher: Arc<dyn Fetcher>) -> Orchestrator {
    let mut orchestrator = Orchestrator::new();

    let sources: Vec<Arc<dyn Source>> = vec![
        Arc::new(MangaDexSource::new(fetcher.clone(), config.sources.mangadex.clone())),
        Arc::new(BatotoSource::new(fetcher, config.sources.batoto.clone())),
    ];
    for source in sources {
        orchestrator.register(source);
    }

    orchestrator
}
