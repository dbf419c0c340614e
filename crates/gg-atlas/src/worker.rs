use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Sender};
use gg_core::{AtlasConfig, CoreError, GlyphAtlas};

use crate::builder::GlyphAtlasBuilder;

/// Demande de construction envoyée au thread atlas.
struct BuildRequest {
    generation: u64,
    config: AtlasConfig,
}

/// Résultat d'une construction, étiqueté par sa génération.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Generation of the request that produced this result.
    pub generation: u64,
    /// Config the atlas was built from.
    pub config: AtlasConfig,
    /// The atlas (already stamped with `generation`) or the build error.
    pub result: Result<GlyphAtlas, CoreError>,
}

/// Thread dédié à la rasterisation des atlas.
///
/// Les requêtes en attente sont fusionnées : seule la plus récente est
/// construite. Les résultats reviennent par un canal flume, à drainer depuis
/// la boucle principale.
pub struct AtlasWorker {
    requests: Option<Sender<BuildRequest>>,
    outcomes: Receiver<BuildOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl AtlasWorker {
    /// Spawn the worker thread, which owns `builder`.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to create the thread.
    pub fn spawn(builder: GlyphAtlasBuilder) -> std::io::Result<Self> {
        let (req_tx, req_rx) = flume::unbounded();
        let (out_tx, out_rx) = flume::unbounded();
        let handle = thread::Builder::new()
            .name("gg-atlas".into())
            .spawn(move || run(builder, &req_rx, &out_tx))?;
        Ok(Self {
            requests: Some(req_tx),
            outcomes: out_rx,
            handle: Some(handle),
        })
    }

    /// Queue a build. Older queued requests are superseded.
    ///
    /// # Errors
    /// [`CoreError::RenderBackend`] if the worker thread has stopped.
    pub fn request(&self, generation: u64, config: AtlasConfig) -> Result<(), CoreError> {
        let Some(tx) = &self.requests else {
            return Err(CoreError::backend("thread atlas arrêté"));
        };
        tx.send(BuildRequest { generation, config })
            .map_err(|_| CoreError::backend("thread atlas arrêté"))
    }

    /// Every result produced since the last call. Never blocks.
    #[must_use]
    pub fn drain(&self) -> Vec<BuildOutcome> {
        self.outcomes.try_iter().collect()
    }

    /// Wait up to `timeout` for the next result.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BuildOutcome> {
        self.outcomes.recv_timeout(timeout).ok()
    }
}

impl Drop for AtlasWorker {
    fn drop(&mut self) {
        // Fermer le canal termine la boucle du thread.
        self.requests.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("thread atlas paniqué");
        }
    }
}

fn run(mut builder: GlyphAtlasBuilder, requests: &Receiver<BuildRequest>, outcomes: &Sender<BuildOutcome>) {
    while let Ok(mut request) = requests.recv() {
        let mut superseded = 0usize;
        for newer in requests.try_iter() {
            request = newer;
            superseded += 1;
        }
        if superseded > 0 {
            log::debug!("{superseded} requête(s) atlas remplacée(s) par g{}", request.generation);
        }

        let generation = request.generation;
        let result = builder
            .build(&request.config)
            .map(|atlas| atlas.with_generation(generation));
        let outcome = BuildOutcome {
            generation,
            config: request.config,
            result,
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    log::debug!("thread atlas terminé");
}
