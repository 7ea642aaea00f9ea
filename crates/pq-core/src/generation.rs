//! Per-request generation state shared by every builder.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::Rng;

use crate::request::{QueryRequest, SelectField};
use crate::synth::{SynthContext, Synthesizer};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

pub struct Generation<'a> {
    pub request: &'a QueryRequest,
    /// Reference instant for lookback windows and relative timestamps.
    pub now: DateTime<Utc>,
    pub rng: StdRng,
    pub synth: Synthesizer,
    pub max_buckets: usize,
    pub max_records: usize,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl<'a> Generation<'a> {
    pub fn new(
        request: &'a QueryRequest,
        now: DateTime<Utc>,
        rng: StdRng,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Self {
        Self {
            request,
            now,
            rng,
            synth: Synthesizer::new(&request.filters, now),
            max_buckets: 10_000,
            max_records: 1_000,
            window,
        }
    }

    /// The request's time range, or `lookback` ending now.
    pub fn window_or(&self, lookback: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
        self.window.unwrap_or((self.now - lookback, self.now))
    }

    pub fn value(&mut self, field: &SelectField, ctx: SynthContext<'_>) -> String {
        self.synth.synthesize(&mut self.rng, field, ctx)
    }

    pub fn count(&mut self, min: u64, max: u64, seed: &str) -> u64 {
        self.synth.count(&mut self.rng, min, max, seed, None)
    }

    /// Uppercase random hex, as used for trace and span ids.
    pub fn hex(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| HEX[self.rng.gen_range(0..HEX.len())] as char)
            .collect()
    }

    /// One row in select order. `special` answers the aliases a builder
    /// owns; every other cell comes from the synthesizer.
    pub fn fill_row<F>(&mut self, ctx: SynthContext<'_>, mut special: F) -> Vec<String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let request = self.request;
        request
            .select
            .iter()
            .map(|field| match special(&field.alias) {
                Some(cell) => cell,
                None => self.value(field, ctx),
            })
            .collect()
    }
}
