//! Offer engine — synthesizes ranked, non-binding product offers.
//!
//! Offers are display artifacts: nothing here is authoritative, no state is
//! kept, and no I/O happens. One call takes an applicant profile plus an
//! injected [`MarketRng`] and returns a scored, sorted candidate list.
//!
//! RULE: the per-candidate draw order (rate, term, affordability multiple,
//! feature subset, response hours) is part of the deterministic contract.
//! Append new draws at the end; never reorder existing ones.

use crate::{
    applicant::ApplicantProfile,
    config::MarketConfig,
    error::{MarketError, MarketResult},
    rng::MarketRng,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How long a synthesized offer claims to stay open.
pub const OFFER_VALIDITY_DAYS: u32 = 7;

/// A synthesized marketplace offer, sorted best-first by score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub institution:     String,
    pub product_name:    String,
    /// Annual percent, one decimal.
    pub interest_rate:   f64,
    pub loan_amount:     f64,
    pub term_months:     u32,
    pub monthly_payment: f64,
    /// Composite suitability score in [0, 100].
    pub score:           f64,
    pub requirements:    Vec<String>,
    pub features:        Vec<String>,
}

/// The richer offer shape used by the auction view. Shares candidate
/// synthesis and scoring with [`Offer`], so the same seed produces the
/// same underlying terms through either call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankOffer {
    pub institution:         String,
    pub product_name:        String,
    pub interest_rate:       f64,
    pub loan_amount:         f64,
    pub term_months:         u32,
    pub monthly_payment:     f64,
    pub total_repayment:     f64,
    pub score:               f64,
    pub approval_likelihood: ApprovalLikelihood,
    /// Claimed institution response time, 1–48 hours.
    pub response_hours:      u32,
    pub valid_for_days:      u32,
    /// 1-based position after sorting.
    pub rank:                u32,
    pub requirements:        Vec<String>,
    pub features:            Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLikelihood {
    High,
    Medium,
    Low,
}

impl ApprovalLikelihood {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            ApprovalLikelihood::High
        } else if score >= 45.0 {
            ApprovalLikelihood::Medium
        } else {
            ApprovalLikelihood::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalLikelihood::High => "high",
            ApprovalLikelihood::Medium => "medium",
            ApprovalLikelihood::Low => "low",
        }
    }
}

/// Amortized per-period payment.
///
/// The rate is applied directly per period (`r = annual_rate_pct / 100`,
/// `n = term_months`) rather than divided by 12 first. Displayed figures
/// have always been computed this way and downstream comparisons rely on
/// the exact values, so the historical formula is kept as-is. A 0% rate
/// falls back to straight division.
pub fn monthly_payment(annual_rate_pct: f64, amount: f64, term_months: u32) -> f64 {
    assert!(term_months > 0, "term_months must be positive");
    if annual_rate_pct == 0.0 {
        return amount / f64::from(term_months);
    }
    let r = annual_rate_pct / 100.0;
    amount * r / (1.0 - (1.0 + r).powf(-f64::from(term_months)))
}

/// One fully-drawn candidate before it is shaped into an `Offer` or
/// `BankOffer`. All randomness happens here, in both call paths, so the
/// two shapes stay draw-for-draw identical under one seed.
struct Candidate {
    institution_idx: usize,
    interest_rate:   f64,
    term_months:     u32,
    monthly_payment: f64,
    score:           f64,
    features:        Vec<String>,
    response_hours:  u32,
}

pub struct OfferEngine {
    config: MarketConfig,
}

impl OfferEngine {
    pub fn new(config: MarketConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Synthesize `count` scored offers for the applicant, best score first.
    pub fn generate_offers(
        &self,
        profile: &ApplicantProfile,
        count: usize,
        rng: &mut MarketRng,
    ) -> MarketResult<Vec<Offer>> {
        let candidates = self.synthesize(profile, count, rng)?;
        let requirements = requirement_list(profile);

        let mut offers: Vec<Offer> = candidates
            .into_iter()
            .map(|c| {
                let inst = &self.config.institutions[c.institution_idx];
                Offer {
                    institution:     inst.name.clone(),
                    product_name:    inst.products.for_type(profile.product_type).to_string(),
                    interest_rate:   c.interest_rate,
                    loan_amount:     profile.requested_amount,
                    term_months:     c.term_months,
                    monthly_payment: c.monthly_payment,
                    score:           c.score,
                    requirements:    requirements.clone(),
                    features:        c.features,
                }
            })
            .collect();

        offers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        log::debug!(
            "offers: {} candidates for {} request of {:.2}",
            offers.len(),
            profile.product_type,
            profile.requested_amount
        );

        Ok(offers)
    }

    /// Synthesize `count` bank offers for the auction view, best score
    /// first, with 1-based ranks stamped after sorting.
    pub fn generate_bank_offers(
        &self,
        profile: &ApplicantProfile,
        count: usize,
        rng: &mut MarketRng,
    ) -> MarketResult<Vec<BankOffer>> {
        let candidates = self.synthesize(profile, count, rng)?;
        let requirements = requirement_list(profile);

        let mut offers: Vec<BankOffer> = candidates
            .into_iter()
            .map(|c| {
                let inst = &self.config.institutions[c.institution_idx];
                let total = c.monthly_payment * f64::from(c.term_months);
                BankOffer {
                    institution:         inst.name.clone(),
                    product_name:        inst.products.for_type(profile.product_type).to_string(),
                    interest_rate:       c.interest_rate,
                    loan_amount:         profile.requested_amount,
                    term_months:         c.term_months,
                    monthly_payment:     c.monthly_payment,
                    total_repayment:     total,
                    score:               c.score,
                    approval_likelihood: ApprovalLikelihood::from_score(c.score),
                    response_hours:      c.response_hours,
                    valid_for_days:      OFFER_VALIDITY_DAYS,
                    rank:                0, // stamped below, after sorting
                    requirements:        requirements.clone(),
                    features:            c.features,
                }
            })
            .collect();

        offers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        for (i, offer) in offers.iter_mut().enumerate() {
            offer.rank = i as u32 + 1;
        }

        log::debug!(
            "offers: {} bank candidates for {} request of {:.2}",
            offers.len(),
            profile.product_type,
            profile.requested_amount
        );

        Ok(offers)
    }

    fn synthesize(
        &self,
        profile: &ApplicantProfile,
        count: usize,
        rng: &mut MarketRng,
    ) -> MarketResult<Vec<Candidate>> {
        self.validate_profile(profile)?;

        let roster = &self.config.institutions;
        let rates = &self.config.rates;
        let terms = &self.config.terms;

        // Rates are drawn in tenths of a percent so quotes carry exactly
        // one decimal without a rounding step.
        let lo_tenths = (rates.min_pct * 10.0).round() as u64;
        let hi_tenths = (rates.max_pct * 10.0).round() as u64;
        let term_span = u64::from(terms.max_months - terms.min_months);

        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let institution_idx = i % roster.len();
            let inst = &roster[institution_idx];

            let tenths = lo_tenths + rng.next_u64_below(hi_tenths - lo_tenths + 1);
            let interest_rate = tenths as f64 / 10.0;

            let term_months = terms.min_months + rng.next_u64_below(term_span + 1) as u32;

            let affordability_multiple = rng.uniform(
                self.config.scoring.affordability_multiple_lo,
                self.config.scoring.affordability_multiple_hi,
            );

            let payment = monthly_payment(interest_rate, profile.requested_amount, term_months);

            let max_k = inst.features.len().min(4);
            let min_k = max_k.min(2);
            let k = min_k + rng.next_u64_below((max_k - min_k) as u64 + 1) as usize;
            let mut picked = rng.pick_distinct(inst.features.len(), k);
            picked.sort_unstable(); // catalog order, not draw order
            let features = picked.into_iter().map(|f| inst.features[f].clone()).collect();

            let response_hours = 1 + rng.next_u64_below(48) as u32;

            out.push(Candidate {
                institution_idx,
                interest_rate,
                term_months,
                monthly_payment: payment,
                score: self.score(profile, payment, affordability_multiple),
                features,
                response_hours,
            });
        }

        Ok(out)
    }

    /// Composite score: income sufficiency (capped), headroom against a
    /// synthetic per-candidate borrowing maximum, and the credit-history
    /// table, clamped into [0, 100].
    fn score(
        &self,
        profile: &ApplicantProfile,
        monthly_payment: f64,
        affordability_multiple: f64,
    ) -> f64 {
        let w = &self.config.scoring;

        let income_factor =
            (profile.monthly_income / monthly_payment * w.income_scale).min(w.income_cap);

        let synthetic_max = profile.monthly_income * affordability_multiple;
        let headroom = if profile.requested_amount <= w.headroom_threshold * synthetic_max {
            w.headroom_full
        } else if profile.requested_amount <= synthetic_max {
            w.headroom_partial
        } else {
            0.0
        };

        (income_factor + headroom + profile.credit_history.base_points()).clamp(0.0, 100.0)
    }

    fn validate_profile(&self, profile: &ApplicantProfile) -> MarketResult<()> {
        if !profile.requested_amount.is_finite() || profile.requested_amount <= 0.0 {
            return Err(MarketError::InvalidAmount {
                field: "requested_amount",
                value: profile.requested_amount,
            });
        }
        if !profile.monthly_income.is_finite() || profile.monthly_income <= 0.0 {
            return Err(MarketError::InvalidAmount {
                field: "monthly_income",
                value: profile.monthly_income,
            });
        }
        if self.config.institutions.is_empty() {
            return Err(MarketError::EmptyInstitutionRoster);
        }
        Ok(())
    }
}

fn requirement_list(profile: &ApplicantProfile) -> Vec<String> {
    profile
        .product_type
        .standard_requirements()
        .iter()
        .map(|r| r.to_string())
        .collect()
}
