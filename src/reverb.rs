//! Reverb demo: download a piano sample and an impulse response, decode
//! both, then play the piano.
//!
//! Both downloads run concurrently; playback starts only once both have been
//! fetched and decoded, whichever finishes first. With `Routing::Convolved`
//! the piano is played through a convolver loaded with the impulse response.

use std::future::Future;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dsp::buffer::AudioBuffer;
use crate::dsp::context::{AudioContext, AudioNode, BufferSourceNode, ScheduledSourceNode};
use crate::error::{AudioError, FetchError, ReverbError};

pub const PIANO_URL: &str =
    "https://raw.githubusercontent.com/learnable-content/jamesseanwright/master/web-audio-series/files/piano.mp3";
pub const IR_URL: &str =
    "https://raw.githubusercontent.com/learnable-content/jamesseanwright/master/web-audio-series/files/ir.mp3";

// ── Configuration ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Routing {
    /// Piano straight to the output; the impulse response is decoded but unused.
    #[default]
    Dry,
    /// Piano through a convolver loaded with the impulse response.
    Convolved,
}

impl FromStr for Routing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dry" => Ok(Routing::Dry),
            "convolved" => Ok(Routing::Convolved),
            other => Err(format!("unknown routing '{other}', expected 'dry' or 'convolved'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    pub piano_url: String,
    pub ir_url: String,
    pub routing: Routing,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        ReverbConfig {
            piano_url: PIANO_URL.to_string(),
            ir_url: IR_URL.to_string(),
            routing: Routing::Dry,
        }
    }
}

// ── Fetching ────────────────────────────────────────────────

/// Downloads a resource as raw bytes.
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>>;
}

/// Plain HTTP GET via `reqwest`. Non-2xx responses are errors.
#[cfg(feature = "net")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "net")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "net")]
impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> {
        let request = self.client.get(url);
        async move {
            let response = request.send().await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        }
    }
}

// ── Pipeline ────────────────────────────────────────────────

/// The two decoded buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverbBuffers {
    pub piano: AudioBuffer,
    pub impulse_response: AudioBuffer,
}

/// Fetch one URL and decode it with the context.
pub async fn download_as_audio_buffer<F: Fetch>(
    fetcher: &F,
    context: &AudioContext,
    url: &str,
) -> Result<AudioBuffer, ReverbError> {
    let bytes = fetcher.fetch(url).await.map_err(|source| ReverbError::Fetch {
        url: url.to_string(),
        source,
    })?;
    debug!("downloaded {} bytes from {url}", bytes.len());
    context
        .decode_audio_data(&bytes)
        .map_err(|source| ReverbError::Decode {
            url: url.to_string(),
            source,
        })
}

/// Download and decode both buffers concurrently. The first failure wins.
pub async fn load_buffers<F: Fetch>(
    fetcher: &F,
    context: &AudioContext,
    config: &ReverbConfig,
) -> Result<ReverbBuffers, ReverbError> {
    let (piano, impulse_response) = tokio::try_join!(
        download_as_audio_buffer(fetcher, context, &config.piano_url),
        download_as_audio_buffer(fetcher, context, &config.ir_url),
    )?;
    Ok(ReverbBuffers {
        piano,
        impulse_response,
    })
}

/// Start the piano buffer, routed according to `routing`.
pub fn play(
    context: &AudioContext,
    buffers: &ReverbBuffers,
    routing: Routing,
) -> Result<BufferSourceNode, AudioError> {
    let piano = context.create_buffer_source();
    piano.set_buffer(buffers.piano.clone());

    match routing {
        Routing::Dry => piano.connect(context.destination())?,
        Routing::Convolved => {
            let convolver = context.create_convolver();
            convolver.set_buffer(&buffers.impulse_response);
            convolver.connect(context.destination())?;
            piano.connect(&convolver)?;
        }
    }

    piano.start()?;
    info!(
        "playing {:.2}s piano sample ({routing:?})",
        buffers.piano.duration()
    );
    Ok(piano)
}

/// Outcome of a full run.
#[derive(Debug)]
pub struct Playback {
    pub source: BufferSourceNode,
    pub buffers: ReverbBuffers,
}

/// Fetch, decode, then play. Nothing is played if any step fails.
pub async fn run<F: Fetch>(
    fetcher: &F,
    context: &AudioContext,
    config: &ReverbConfig,
) -> Result<Playback, ReverbError> {
    let buffers = load_buffers(fetcher, context, config).await?;
    let source = play(context, &buffers, config.routing)?;
    Ok(Playback { source, buffers })
}
