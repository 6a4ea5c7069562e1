//! Device handle construction and sample acquisition
//!
//! No hardware driver ships with this crate. [`open_device`] checks the device section
//! and hands back a [`SimulatedSdr`] tuned the same way, which fills every block with
//! receiver noise. A real front end plugs in by implementing [`Acquirer`].

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info};

use crate::{
    collaborators::{Acquirer, Samples},
    complex::ComplexByte,
    config::{Connection, DeviceParams, DspParams, Gain},
    error::BoxError,
};

// Amplitude of the noise at 0 dB, in ADC counts
const BASE_AMPLITUDE: f64 = 8.0;

#[derive(Debug)]
pub struct SimulatedSdr {
    params: DeviceParams,
    amplitude: i8,
    rng: StdRng,
}

/// Open the SDR described by `params`
pub fn open_device(params: &DeviceParams, seed: Option<u64>) -> Result<SimulatedSdr, BoxError> {
    match params.connection {
        Connection::Local => info!("Opening local SDR"),
        Connection::Tcp => info!("Opening SDR at {}:{}", params.host, params.port),
    }
    if params.connection == Connection::Tcp && params.host.is_empty() {
        return Err("tcp connection needs a host".into());
    }
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let sdr = SimulatedSdr {
        amplitude: amplitude(params.gain),
        params: params.clone(),
        rng,
    };
    debug!(
        frequency = sdr.params.frequency,
        ppm = sdr.params.freq_correction,
        amplitude = sdr.amplitude,
        "Tuned SDR"
    );
    Ok(sdr)
}

fn amplitude(gain: Gain) -> i8 {
    let db = match gain {
        Gain::Db(db) => db,
        // Pretend AGC lands mid scale
        Gain::Auto(_) => 20.0,
    };
    (BASE_AMPLITUDE * 10f64.powf(db / 20.0)).clamp(1.0, i8::MAX as f64) as i8
}

impl Acquirer for SimulatedSdr {
    fn collect(&mut self, sample_rate: f64, dsp: &DspParams) -> Result<Samples, BoxError> {
        if sample_rate != self.params.sample_rate {
            return Err(format!(
                "device is configured for {} S/s, asked for {} S/s",
                self.params.sample_rate, sample_rate
            )
            .into());
        }
        let n = dsp.samples_per_block();
        let a = self.amplitude;
        let rng = &mut self.rng;
        let blocks = (0..dsp.number_of_fft)
            .map(|_| {
                (0..n)
                    .map(|_| ComplexByte::new(rng.gen_range(-a..=a), rng.gen_range(-a..=a)))
                    .collect()
            })
            .collect();
        Ok(Samples {
            sample_rate,
            center_frequency: self.params.frequency,
            blocks,
        })
    }
}
