use crate::advised::{AdvisedAlm, AdvisedDlv};
use crate::deviation_dlv::DeviationDlv;
use crate::error::StrategyError;
use crate::features::{ALM_OBS_DIM, DEBT_OBS_DIM};
use crate::periodic_alm::PeriodicAlm;
use crate::Strategy;
use advisor::create_advisor;
use configuration::Config;
use core_types::Owner;

/// The two strategies one run drives, one per rebalance kind.
pub struct StrategyPair {
    pub dlv: Box<dyn Strategy>,
    pub alm: Box<dyn Strategy>,
}

/// Creates the debt and liquidity strategies described by `config`.
///
/// Without an `[advisor]` entry for a kind the mechanical strategy is used.
/// With one, the advisor is started here (a subprocess advisor spawns its
/// process, so this must run inside a Tokio runtime) and the mechanical
/// strategy becomes its fallback.
pub fn create_strategies(config: &Config) -> Result<StrategyPair, StrategyError> {
    let operator = Owner::new(config.backtest.operator.clone());
    let deviation = DeviationDlv::new(&config.debt, operator)?;
    let periodic = PeriodicAlm::new(&config.alm)?;

    let advisor = config.advisor.as_ref();
    let debt_source = advisor.and_then(|a| a.debt.as_ref().map(|s| (a, s)));
    let alm_source = advisor.and_then(|a| a.alm.as_ref().map(|s| (a, s)));

    let dlv: Box<dyn Strategy> = match debt_source {
        Some((settings, source)) => {
            let advisor = create_advisor(source, DEBT_OBS_DIM, settings.timeout)
                .map_err(|e| StrategyError::Advisor { advisor: "debt".to_string(), source: e })?;
            Box::new(AdvisedDlv::new(advisor, deviation, settings.on_error, config.pool.tick_spacing)?)
        }
        None => Box::new(deviation),
    };

    let alm: Box<dyn Strategy> = match alm_source {
        Some((settings, source)) => {
            let advisor = create_advisor(source, ALM_OBS_DIM, settings.timeout)
                .map_err(|e| StrategyError::Advisor { advisor: "alm".to_string(), source: e })?;
            Box::new(AdvisedAlm::new(advisor, periodic, settings.on_error, config.vault.base_threshold)?)
        }
        None => Box::new(periodic),
    };

    tracing::info!(dlv = dlv.name(), alm = alm.name(), "Strategies created");
    Ok(StrategyPair { dlv, alm })
}
