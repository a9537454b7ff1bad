//! Marketplace configuration: the institution catalog, scoring weights,
//! and the value bands candidates are drawn from.
//!
//! The built-in catalog covers the fixed roster the marketplace fronts.
//! Deployments can replace it with a JSON catalog via [`MarketConfig::load`];
//! in tests, use [`MarketConfig::builtin`].

use crate::applicant::ProductType;
use serde::{Deserialize, Serialize};

/// How many candidates one generation call synthesizes unless the caller
/// asks for a different count.
pub const DEFAULT_OFFER_COUNT: usize = 15;

/// One institution on the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionConfig {
    pub name: String,
    /// Commercial product names. Exhaustive: every supported product type
    /// has exactly one name per institution.
    pub products: ProductNames,
    /// Trait pool that offer features are sampled from.
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductNames {
    pub personal_loan: String,
    pub vehicle_loan: String,
    pub mortgage: String,
    pub credit_card: String,
    pub savings_account: String,
}

impl ProductNames {
    pub fn for_type(&self, product: ProductType) -> &str {
        match product {
            ProductType::PersonalLoan => &self.personal_loan,
            ProductType::VehicleLoan => &self.vehicle_loan,
            ProductType::Mortgage => &self.mortgage,
            ProductType::CreditCard => &self.credit_card,
            ProductType::SavingsAccount => &self.savings_account,
        }
    }
}

/// Weights of the three score factors. The credit-history table is not
/// here: it is an exhaustive match on [`crate::applicant::CreditHistory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Cap on the income-sufficiency contribution.
    pub income_cap: f64,
    /// Multiplier applied to income / payment before capping.
    pub income_scale: f64,
    /// Contribution when requested <= headroom_threshold x synthetic max.
    pub headroom_full: f64,
    /// Contribution when requested <= synthetic max.
    pub headroom_partial: f64,
    pub headroom_threshold: f64,
    /// Synthetic per-candidate maximum = monthly income x uniform(lo, hi).
    pub affordability_multiple_lo: f64,
    pub affordability_multiple_hi: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateBand {
    /// Annual percent, inclusive bounds. Quotes carry one decimal.
    pub min_pct: f64,
    pub max_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermBand {
    /// Months, inclusive bounds.
    pub min_months: u32,
    pub max_months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub institutions: Vec<InstitutionConfig>,
    pub scoring: ScoringWeights,
    pub rates: RateBand,
    pub terms: TermBand,
}

impl MarketConfig {
    /// The fixed roster and the historical scoring constants.
    pub fn builtin() -> Self {
        Self {
            institutions: builtin_roster(),
            scoring: ScoringWeights {
                income_cap: 40.0,
                income_scale: 10.0,
                headroom_full: 30.0,
                headroom_partial: 15.0,
                headroom_threshold: 0.8,
                affordability_multiple_lo: 18.0,
                affordability_multiple_hi: 42.0,
            },
            rates: RateBand {
                min_pct: 5.0,
                max_pct: 25.0,
            },
            terms: TermBand {
                min_months: 12,
                max_months: 60,
            },
        }
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: MarketConfig = serde_json::from_str(&content)?;
        if config.institutions.is_empty() {
            anyhow::bail!("Catalog {path} lists no institutions");
        }
        if config.rates.max_pct < config.rates.min_pct
            || config.terms.max_months < config.terms.min_months
        {
            anyhow::bail!("Catalog {path} has an inverted rate or term band");
        }
        Ok(config)
    }
}

fn builtin_roster() -> Vec<InstitutionConfig> {
    fn institution(
        name: &str,
        products: [&str; 5],
        features: &[&str],
    ) -> InstitutionConfig {
        InstitutionConfig {
            name: name.to_string(),
            products: ProductNames {
                personal_loan: products[0].to_string(),
                vehicle_loan: products[1].to_string(),
                mortgage: products[2].to_string(),
                credit_card: products[3].to_string(),
                savings_account: products[4].to_string(),
            },
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }

    vec![
        institution(
            "Meridian National Bank",
            [
                "Meridian FlexLoan",
                "Meridian AutoDrive",
                "Meridian HomeFirst",
                "Meridian Rewards Card",
                "Meridian Grow Savings",
            ],
            &[
                "No early-repayment penalty",
                "Same-day pre-approval",
                "Full online account management",
                "Payment holiday once a year",
                "Free payment insurance for 12 months",
            ],
        ),
        institution(
            "Harborview Credit Union",
            [
                "Harborview Member Loan",
                "Harborview Wheels",
                "Harborview Homestead",
                "Harborview Classic Card",
                "Harborview Anchor Savings",
            ],
            &[
                "Member dividend on interest paid",
                "No account maintenance fees",
                "Rate discount with direct deposit",
                "In-branch advisor included",
            ],
        ),
        institution(
            "Atlas Finance",
            [
                "Atlas Express Credit",
                "Atlas MotorPlan",
                "Atlas Mortgage Prime",
                "Atlas Platinum Card",
                "Atlas Reserve Account",
            ],
            &[
                "Approval decision in 15 minutes",
                "100% digital onboarding",
                "Flexible due-date selection",
                "Instant virtual card",
                "No paperwork for existing customers",
            ],
        ),
        institution(
            "Pioneer Savings Bank",
            [
                "Pioneer Personal Credit",
                "Pioneer Auto Credit",
                "Pioneer Home Loan",
                "Pioneer Everyday Card",
                "Pioneer High-Yield Savings",
            ],
            &[
                "Fixed rate for the full term",
                "Free extra amortizations",
                "Loyalty rate after first year",
                "Joint applications accepted",
            ],
        ),
        institution(
            "Crestline Capital",
            [
                "Crestline Advance",
                "Crestline DriveLine",
                "Crestline Estate Loan",
                "Crestline Signature Card",
                "Crestline Builder Savings",
            ],
            &[
                "Dedicated account executive",
                "Preferential FX rates",
                "Cashback on punctual payments",
                "Top-up credit after 6 months",
                "Airport lounge access",
            ],
        ),
        institution(
            "Union Square Bank",
            [
                "Union Square QuickLoan",
                "Union Square AutoFlex",
                "Union Square Residence",
                "Union Square Daily Card",
                "Union Square Ladder Savings",
            ],
            &[
                "No origination fee",
                "Mobile-first servicing",
                "Automatic rate review every 12 months",
                "Refinancing without penalties",
            ],
        ),
    ]
}
