//! Copper task wrapping the controller: navigation and demands in, pitch and throttle out.

use crate::config::TecsConfig;
use crate::controller::{Tecs, TecsSnapshot};
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use cu29::prelude::*;
use cu_tecs_payloads::{NavPayload, TecsCommandPayload, TecsOutputPayload};

/// Runs the fast estimators on every navigation sample and the control laws at
/// `dispatch_rate_hz`. Between dispatches the last demand is republished.
pub struct TecsTask {
    tecs: Tecs,
    dispatch_period: CuDuration,
    last_dispatch: Option<CuTime>,
    last_output: Option<TecsOutputPayload>,
}

impl TecsTask {
    pub fn from_config(config: TecsConfig) -> Self {
        let dispatch_period = CuDuration::from((1e9 / config.dispatch_rate_hz as f64) as u64);
        Self {
            tecs: Tecs::new(config),
            dispatch_period,
            last_dispatch: None,
            last_output: None,
        }
    }

    pub fn controller(&self) -> &Tecs {
        &self.tecs
    }

    pub fn controller_mut(&mut self) -> &mut Tecs {
        &mut self.tecs
    }

    fn dispatch_due(&self, now: CuTime) -> bool {
        match self.last_dispatch {
            Some(last) => now.as_nanos().saturating_sub(last.as_nanos()) >= self.dispatch_period.as_nanos(),
            None => true,
        }
    }
}

impl Freezable for TecsTask {
    fn freeze<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.tecs.snapshot(), encoder)?;
        Encode::encode(&self.last_dispatch.map(|t| t.as_nanos()), encoder)?;
        Ok(())
    }

    fn thaw<D: Decoder>(&mut self, decoder: &mut D) -> Result<(), DecodeError> {
        let snapshot: TecsSnapshot = Decode::decode(decoder)?;
        self.tecs.restore(&snapshot);
        let last_dispatch: Option<u64> = Decode::decode(decoder)?;
        self.last_dispatch = last_dispatch.map(CuTime::from);
        self.last_output = None;
        Ok(())
    }
}

impl CuTask for TecsTask {
    type Input<'m> = input_msg!('m, NavPayload, TecsCommandPayload);
    type Output<'m> = output_msg!(TecsOutputPayload);

    fn new(config: Option<&ComponentConfig>) -> CuResult<Self>
    where
        Self: Sized,
    {
        let config = match config {
            Some(config) => TecsConfig::from_component_config(config)?,
            None => TecsConfig::default(),
        };
        info!(
            "TECS: dispatch at {} Hz, fixed height {} m",
            config.dispatch_rate_hz, config.fix_height
        );
        Ok(Self::from_config(config))
    }

    fn process(
        &mut self,
        clock: &RobotClock,
        input: &Self::Input<'_>,
        output: &mut Self::Output<'_>,
    ) -> CuResult<()> {
        let (nav_msg, cmd_msg) = *input;
        let Some(nav) = nav_msg.payload() else {
            output.clear_payload();
            return Ok(());
        };
        let now = match nav_msg.tov {
            Tov::Time(t) => t,
            _ => clock.now(),
        };

        self.tecs.update_fast_estimators(now, nav);

        let out = match (cmd_msg.payload(), self.dispatch_due(now)) {
            (Some(cmd), true) => {
                self.last_dispatch = Some(now);
                let out = self.tecs.update_pitch_throttle(now, nav, cmd);
                self.last_output = Some(out);
                out
            }
            _ => match self.last_output {
                Some(out) => out,
                None => {
                    output.clear_payload();
                    return Ok(());
                }
            },
        };

        output.metadata.set_status(out.to_string());
        output.set_payload(out);
        Ok(())
    }

    fn stop(&mut self, _clock: &RobotClock) -> CuResult<()> {
        self.last_dispatch = None;
        self.last_output = None;
        Ok(())
    }
}
