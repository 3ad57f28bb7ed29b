//! Static valuation reference data.
//!
//! Flat, illustrative constants: a two-tier brand base value and a five-step
//! condition scale. Built once at startup and shared read-only.

use rust_decimal::Decimal;
use serde::Serialize;

/// `estimated_value` must exceed `listed_price` by this factor to be admitted.
pub const ADMISSION_FACTOR: Decimal = Decimal::from_parts(130, 0, 0, false, 2);

/// Lowest score on the condition scale, used when no keyword matches.
pub const FALLBACK_SCORE: i16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrandTier {
    Premium,
    Standard,
}

/// Recommended disposition for an acquired item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    ResellAsNew,
    Resell,
    Refurbish,
    PartOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Brand {
    pub name: String,
    pub tier: BrandTier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGrade {
    pub score: i16,
    pub keywords: Vec<String>,
    pub multiplier: Decimal,
    pub action: Disposition,
}

/// Result of scoring one listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appraisal {
    pub brand: String,
    pub tier: BrandTier,
    pub condition_score: i16,
    pub estimated_value: Decimal,
    pub action: Disposition,
}

#[derive(Debug, Clone)]
pub struct ValuationModel {
    /// Match order is list order; first hit wins.
    pub brands: Vec<Brand>,
    /// Ordered from the best grade down; the last entry is the fallback.
    pub grades: Vec<ConditionGrade>,
    pub premium_base: Decimal,
    pub standard_base: Decimal,
}

impl ValuationModel {
    pub fn standard() -> Self {
        let premium = ["Rolex", "Omega", "Leica", "Hasselblad", "Hermes"];
        let standard = ["Seiko", "Canon", "Nikon", "Fujifilm", "Sony"];

        let brands = premium
            .iter()
            .map(|name| Brand {
                name: name.to_string(),
                tier: BrandTier::Premium,
            })
            .chain(standard.iter().map(|name| Brand {
                name: name.to_string(),
                tier: BrandTier::Standard,
            }))
            .collect();

        Self {
            brands,
            grades: standard_grades(),
            premium_base: Decimal::new(1200, 0),
            standard_base: Decimal::new(250, 0),
        }
    }

    /// First brand whose name occurs in the title, case-insensitively.
    pub fn match_brand(&self, title: &str) -> Option<&Brand> {
        let title = title.to_lowercase();
        self.brands
            .iter()
            .find(|brand| title.contains(&brand.name.to_lowercase()))
    }

    /// Ordered keyword match over free-text condition signals.
    pub fn score_condition(&self, text: &str) -> i16 {
        let text = text.to_lowercase();
        self.grades
            .iter()
            .find(|grade| grade.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|grade| grade.score)
            .unwrap_or(FALLBACK_SCORE)
    }

    pub fn grade(&self, score: i16) -> Option<&ConditionGrade> {
        self.grades.iter().find(|grade| grade.score == score)
    }

    pub fn base_value(&self, tier: BrandTier) -> Decimal {
        match tier {
            BrandTier::Premium => self.premium_base,
            BrandTier::Standard => self.standard_base,
        }
    }

    /// Score a listing; `None` when no brand matches.
    ///
    /// The condition text is preferred; the title is used when the listing
    /// carries no condition field.
    pub fn appraise(&self, title: &str, condition: Option<&str>) -> Option<Appraisal> {
        let brand = self.match_brand(title)?;
        let score = self.score_condition(condition.unwrap_or(title));
        let grade = self.grade(score)?;

        Some(Appraisal {
            brand: brand.name.clone(),
            tier: brand.tier,
            condition_score: score,
            estimated_value: (self.base_value(brand.tier) * grade.multiplier).round_dp(2),
            action: grade.action,
        })
    }

    /// Strict admission rule: `estimated > listed × 1.30`.
    ///
    /// A price too large to scale is never admitted.
    pub fn admits(estimated_value: Decimal, listed_price: Decimal) -> bool {
        listed_price
            .checked_mul(ADMISSION_FACTOR)
            .is_some_and(|threshold| estimated_value > threshold)
    }
}

impl Default for ValuationModel {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_grades() -> Vec<ConditionGrade> {
    let grade = |score, keywords: &[&str], multiplier: i64, action| ConditionGrade {
        score,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        multiplier: Decimal::new(multiplier, 2),
        action,
    };

    vec![
        grade(5, &["new", "mint"], 100, Disposition::ResellAsNew),
        grade(4, &["excellent"], 85, Disposition::Resell),
        grade(3, &["good", "used"], 70, Disposition::Resell),
        grade(2, &["fair", "parts"], 40, Disposition::Refurbish),
        grade(FALLBACK_SCORE, &[], 20, Disposition::PartOut),
    ]
}
