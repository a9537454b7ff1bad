//! Applicant-side input model: the financial profile a form submission
//! produces, and the closed enums describing it.
//!
//! RULE: every table keyed by one of these enums is an exhaustive match.
//! An unsupported product or credit band is a parse-time error, never a
//! silent missing-key lookup.

use crate::error::MarketError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five product lines the marketplace fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductType {
    PersonalLoan,
    VehicleLoan,
    Mortgage,
    CreditCard,
    SavingsAccount,
}

impl ProductType {
    pub const ALL: [ProductType; 5] = [
        ProductType::PersonalLoan,
        ProductType::VehicleLoan,
        ProductType::Mortgage,
        ProductType::CreditCard,
        ProductType::SavingsAccount,
    ];

    /// Stable wire name, matching the serde encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalLoan => "personal-loan",
            Self::VehicleLoan => "vehicle-loan",
            Self::Mortgage => "mortgage",
            Self::CreditCard => "credit-card",
            Self::SavingsAccount => "savings-account",
        }
    }

    /// Paperwork asked of every applicant for this product. Fixed per
    /// product; the engine copies it verbatim onto each offer.
    pub fn standard_requirements(&self) -> &'static [&'static str] {
        match self {
            Self::PersonalLoan => &[
                "Government-issued ID",
                "Proof of income (last 3 payslips)",
                "Bank statement (last 3 months)",
            ],
            Self::VehicleLoan => &[
                "Government-issued ID",
                "Proof of income (last 3 payslips)",
                "Vehicle quotation or purchase agreement",
                "Driving licence",
            ],
            Self::Mortgage => &[
                "Government-issued ID",
                "Proof of income (last 3 payslips)",
                "Property appraisal",
                "Preliminary title deed",
                "Bank statement (last 6 months)",
            ],
            Self::CreditCard => &[
                "Government-issued ID",
                "Proof of income (last 3 payslips)",
                "Credit bureau authorization",
            ],
            Self::SavingsAccount => &["Government-issued ID", "Proof of address"],
        }
    }
}

impl FromStr for ProductType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal-loan" => Ok(Self::PersonalLoan),
            "vehicle-loan" => Ok(Self::VehicleLoan),
            "mortgage" => Ok(Self::Mortgage),
            "credit-card" => Ok(Self::CreditCard),
            "savings-account" => Ok(Self::SavingsAccount),
            _ => Err(MarketError::InvalidProductType {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-declared credit standing. The score table lives here so the
/// mapping stays exhaustive; there is no "unknown" row by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditHistory {
    Excellent,
    Good,
    Regular,
    New,
}

impl CreditHistory {
    /// Score contribution of the credit band.
    pub fn base_points(&self) -> f64 {
        match self {
            Self::Excellent => 30.0,
            Self::Good => 20.0,
            Self::Regular => 10.0,
            Self::New => 5.0,
        }
    }
}

impl FromStr for CreditHistory {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "regular" => Ok(Self::Regular),
            "new" => Ok(Self::New),
            _ => Err(MarketError::UnsupportedValue {
                what: "credit history",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    Salaried,
    SelfEmployed,
    Retired,
    Unemployed,
}

impl FromStr for EmploymentType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "salaried" => Ok(Self::Salaried),
            "self_employed" => Ok(Self::SelfEmployed),
            "retired" => Ok(Self::Retired),
            "unemployed" => Ok(Self::Unemployed),
            _ => Err(MarketError::UnsupportedValue {
                what: "employment type",
                value: s.to_string(),
            }),
        }
    }
}

/// How soon the applicant says they need the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    ThisMonth,
    Exploring,
}

/// One form submission. Immutable for the duration of a generation call
/// and discarded once offers are displayed; it is never written to the
/// tracking store unless a caller logs it explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub full_name: String,
    pub national_id: String,
    pub email: String,
    pub phone: String,
    pub monthly_income: f64,
    pub requested_amount: f64,
    pub product_type: ProductType,
    pub credit_history: CreditHistory,
    pub employment_type: EmploymentType,
    pub has_existing_debt: bool,
    pub is_existing_customer: bool,
    pub urgency: Urgency,
}
