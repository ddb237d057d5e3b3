//! Render the synthkeys demos to WAV files.
//!
//! Usage:
//!   synthkeys keys "adfg-hk" -o melody.wav
//!   synthkeys reverb --convolve -o piano.wav

use std::error::Error;
use std::path::PathBuf;

use log::info;
use structopt::StructOpt;

use synthkeys_core::app::Demos;
use synthkeys_core::dsp::context::AudioContext;
use synthkeys_core::dsp::oscillator::Waveform;
use synthkeys_core::dsp::renderer::encode_wav;
use synthkeys_core::keyboard::{InputEvent, KeyboardConfig};
use synthkeys_core::reverb::{self, HttpFetcher, ReverbConfig, Routing};

#[derive(Debug, StructOpt)]
#[structopt(name = "synthkeys", about = "Render the synthkeys audio demos to WAV")]
struct Opt {
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// Output sample rate in Hz.
    #[structopt(long, default_value = "44100")]
    sample_rate: u32,

    #[structopt(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, StructOpt)]
enum Cmd {
    /// Press keys on the keyboard one after another (`-` rests).
    Keys {
        /// Bound keys are `a w d r f g y h u k o l`; anything else is silent.
        keys: String,

        #[structopt(long, default_value = "4")]
        octave: u32,

        #[structopt(long, default_value = "square")]
        waveform: Waveform,

        /// How long each key is held, in milliseconds.
        #[structopt(long, default_value = "250")]
        note_ms: u64,

        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,

        /// Print the rendered key elements as JSON.
        #[structopt(long)]
        dump_keys: bool,
    },
    /// Download the piano and impulse-response samples and play the piano.
    Reverb {
        #[structopt(long)]
        piano_url: Option<String>,

        #[structopt(long)]
        ir_url: Option<String>,

        /// Route the piano through the impulse response.
        #[structopt(long)]
        convolve: bool,

        /// Seconds of audio to render.
        #[structopt(long, default_value = "5")]
        seconds: f64,

        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::from_args();

    let level = match opt.verbose {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    simple_logger::init_with_level(level)?;

    let context = AudioContext::new(opt.sample_rate as f64)?;

    match opt.cmd {
        Cmd::Keys {
            keys,
            octave,
            waveform,
            note_ms,
            output,
            dump_keys,
        } => {
            let mut demos = Demos::with_defaults(&context, KeyboardConfig { octave, waveform })?;
            if dump_keys {
                println!(
                    "{}",
                    serde_json::to_string_pretty(demos.keyboard.container().children())?
                );
            }

            let note_frames = (opt.sample_rate as u64 * note_ms / 1000) as usize;
            let mut samples = Vec::with_capacity(note_frames * keys.chars().count());
            for key in keys.chars() {
                let key = key.to_string();
                demos.keyboard.handle_event(&InputEvent::key_down(&key))?;
                samples.extend(context.render(note_frames));
                demos.keyboard.handle_event(&InputEvent::key_up(&key))?;
            }

            std::fs::write(&output, encode_wav(&samples, opt.sample_rate)?)?;
            info!("wrote {} samples to {}", samples.len(), output.display());
        }
        Cmd::Reverb {
            piano_url,
            ir_url,
            convolve,
            seconds,
            output,
        } => {
            let defaults = ReverbConfig::default();
            let config = ReverbConfig {
                piano_url: piano_url.unwrap_or(defaults.piano_url),
                ir_url: ir_url.unwrap_or(defaults.ir_url),
                routing: if convolve { Routing::Convolved } else { Routing::Dry },
            };

            let fetcher = HttpFetcher::new();
            reverb::run(&fetcher, &context, &config).await?;

            let frames = (seconds.max(0.0) * opt.sample_rate as f64) as usize;
            let samples = context.render(frames);
            std::fs::write(&output, encode_wav(&samples, opt.sample_rate)?)?;
            info!("wrote {} samples to {}", samples.len(), output.display());
        }
    }

    Ok(())
}
