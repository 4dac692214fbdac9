use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::{EngineError, build_chain_with_finishing_service};
use crate::limits::MAX_SEGMENT_MIN;
use crate::model::*;

/// Service catalog plus pricing items, as fetched by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub pricing: Vec<PricingItem>,
}

/// One entry of a customer's requested chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRequestItem {
    pub service_id: String,
    #[serde(default)]
    pub pricing_id: Option<String>,
}

impl Catalog {
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Lookup by exact id, then by normalized name.
    pub fn find_service(&self, identifier: &str) -> Option<&Service> {
        let identifier = identifier.trim();
        self.service(identifier).or_else(|| {
            let wanted = normalize_name(identifier);
            self.services.iter().find(|s| normalize_name(&s.name) == wanted)
        })
    }

    /// The requested pricing item when it belongs to the service, else the
    /// service's first pricing item.
    pub fn pricing_for(&self, service_id: &str, pricing_id: Option<&str>) -> Option<&PricingItem> {
        let for_service = |p: &&PricingItem| p.service_id == service_id;
        pricing_id
            .and_then(|pid| self.pricing.iter().filter(for_service).find(|p| p.id == pid))
            .or_else(|| self.pricing.iter().find(for_service))
    }

    /// Pair a service with its pricing, synthesizing one from the catalog
    /// duration (or the configured default) when none exists. Lengths and
    /// gaps longer than a day are capped.
    pub fn chain_input(&self, service: &Service, pricing_id: Option<&str>, default_duration_min: Min) -> ChainServiceInput {
        let pricing = match self.pricing_for(&service.id, pricing_id) {
            Some(p) => p.clone(),
            None => {
                tracing::warn!(service_id = %service.id, "no pricing item, using catalog duration");
                default_pricing(service, default_duration_min)
            }
        };
        let mut input = ChainServiceInput {
            service: service.clone(),
            pricing,
            finish_gap_before: None,
        };
        cap_durations(&mut input);
        input
    }

    /// Turn a request into chain inputs, appending the finishing service
    /// when any selected service requires it.
    pub fn assemble_chain(
        &self,
        items: &[ChainRequestItem],
        config: &EngineConfig,
    ) -> Result<Vec<ChainServiceInput>, EngineError> {
        if items.is_empty() {
            return Err(EngineError::EmptyChain);
        }
        if items.len() > config.max_chain_len {
            return Err(EngineError::LimitExceeded("too many services in chain"));
        }
        let chain = items
            .iter()
            .map(|item| {
                let service = self
                    .service(&item.service_id)
                    .ok_or_else(|| EngineError::UnknownService(item.service_id.clone()))?;
                if !service.enabled {
                    return Err(EngineError::ServiceDisabled(service.id.clone()));
                }
                Ok(self.chain_input(service, item.pricing_id.as_deref(), config.default_duration_min))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(build_chain_with_finishing_service(&chain, self, config))
    }
}

fn cap_durations(input: &mut ChainServiceInput) {
    let service_id = input.service.id.clone();
    let cap = |minutes: &mut Min, field: &'static str| {
        if *minutes > MAX_SEGMENT_MIN {
            tracing::warn!(%service_id, field, minutes = *minutes, "capping at {MAX_SEGMENT_MIN} minutes");
            *minutes = MAX_SEGMENT_MIN;
        }
    };
    cap(&mut input.service.duration, "duration");
    if let Some(gap) = input.service.finish_gap_minutes.as_mut() {
        cap(gap, "finishGapMinutes");
    }
    cap(&mut input.pricing.duration_min_minutes, "durationMinMinutes");
    cap(&mut input.pricing.duration_max_minutes, "durationMaxMinutes");
    if let Some(follow_up) = input.pricing.follow_up.as_mut() {
        cap(&mut follow_up.duration_minutes, "followUp.durationMinutes");
        cap(&mut follow_up.wait_minutes, "followUp.waitMinutes");
    }
}

fn default_pricing(service: &Service, default_duration_min: Min) -> PricingItem {
    let duration = if service.duration > 0 { service.duration } else { default_duration_min };
    PricingItem {
        id: format!("{}:default", service.id),
        service_id: service.id.clone(),
        duration_min_minutes: duration,
        duration_max_minutes: duration,
        kind: None,
        has_follow_up: false,
        follow_up: None,
    }
}
