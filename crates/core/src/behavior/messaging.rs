//! Static tables mapping scores and averages to storefront messaging.

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use rust_decimal::Decimal;
use serde::Serialize;

use super::aggregate::BehaviorAverages;
use crate::types::round_to_cents;

/// Urgency banner chosen from the conversion score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Viewers,
    Viral,
    LowStock,
    HighDemand,
    LastUnit,
}

impl UrgencyTier {
    /// Lower score bound of each tier, in ascending order.
    const THRESHOLDS: [(f64, Self); 5] = [
        (0.40, Self::Viewers),
        (0.55, Self::Viral),
        (0.65, Self::LowStock),
        (0.75, Self::HighDemand),
        (0.85, Self::LastUnit),
    ];

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Viewers => "👀 Other people are looking at this product right now",
            Self::Viral => "⭐ Trending product · Highly rated today",
            Self::LowStock => "🔥 Only a few units left",
            Self::HighDemand => "🚨 High demand · Could sell out today",
            Self::LastUnit => "⏰ Last unit available · Buy before someone else does",
        }
    }

    /// Button label, only for the upper tiers.
    #[must_use]
    pub const fn cta(self) -> Option<&'static str> {
        match self {
            Self::Viewers | Self::Viral => None,
            Self::LowStock => Some("Add to cart"),
            Self::HighDemand => Some("Add now"),
            Self::LastUnit => Some("Buy now"),
        }
    }
}

/// Urgency tier for `score`, or `None` below 0.40 (and for non-finite input).
///
/// Tiers are half-open `[min, next)`; the last tier also takes 1.0.
#[must_use]
pub fn urgency_for(score: f64) -> Option<UrgencyTier> {
    if !score.is_finite() {
        return None;
    }
    UrgencyTier::THRESHOLDS
        .iter()
        .rev()
        .find(|(min, _)| score >= *min)
        .map(|(_, tier)| *tier)
}

/// Call-to-action offered next to the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaOffer {
    BuyNow,
    Discount,
    FreeGuide,
}

impl CtaOffer {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BuyNow => "🔥 Buy now",
            Self::Discount => "🎁 10% off",
            Self::FreeGuide => "📩 Free guide",
        }
    }
}

#[must_use]
pub fn cta_for(score: f64) -> CtaOffer {
    if score > 0.7 {
        CtaOffer::BuyNow
    } else if score > 0.4 {
        CtaOffer::Discount
    } else {
        CtaOffer::FreeGuide
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestimonialCategory {
    Quality,
    Speed,
    Support,
    Value,
    Usability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Testimonial {
    pub text: &'static str,
    pub author: &'static str,
    pub category: TestimonialCategory,
}

pub const TESTIMONIALS: [Testimonial; 5] = [
    Testimonial {
        text: "Amazing quality! It exceeded my expectations as a collectible.",
        author: "Maria G.",
        category: TestimonialCategory::Quality,
    },
    Testimonial {
        text: "Super fast shipping. Received my order in just 2 days.",
        author: "Carlos M.",
        category: TestimonialCategory::Speed,
    },
    Testimonial {
        text: "Excellent customer service. They answered all my questions.",
        author: "Ana L.",
        category: TestimonialCategory::Support,
    },
    Testimonial {
        text: "Great value for money. Totally worth it.",
        author: "Juan P.",
        category: TestimonialCategory::Value,
    },
    Testimonial {
        text: "Easy to use. Made collecting fun and simple.",
        author: "Sofia R.",
        category: TestimonialCategory::Usability,
    },
];

/// Category that best matches the visitor population, or `None` with two
/// samples or fewer.
#[must_use]
pub fn testimonial_category(averages: &BehaviorAverages) -> Option<TestimonialCategory> {
    if averages.sample_count <= 2 {
        return None;
    }
    let category = if averages.time > 20_000.0 && averages.clicks > 10.0 {
        TestimonialCategory::Quality
    } else if averages.scroll > 0.8 {
        TestimonialCategory::Usability
    } else if averages.time > 10_000.0 {
        TestimonialCategory::Value
    } else if averages.clicks > 5.0 {
        TestimonialCategory::Support
    } else {
        TestimonialCategory::Speed
    };
    Some(category)
}

/// Pick a testimonial by category, falling back to a random one.
pub fn select_testimonial<R: Rng + ?Sized>(
    averages: Option<&BehaviorAverages>,
    rng: &mut R,
) -> &'static Testimonial {
    let by_category = averages
        .and_then(testimonial_category)
        .and_then(|category| TESTIMONIALS.iter().find(|t| t.category == category));

    match by_category {
        Some(testimonial) => testimonial,
        None => TESTIMONIALS.choose(rng).unwrap_or(&TESTIMONIALS[0]),
    }
}

/// Adjusted price for a product given a willingness-to-pay estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAdjustment {
    pub base_price: Decimal,
    pub price: Decimal,
    /// Negative for a markup.
    pub discount_percent: i32,
}

/// `> 0.8` pays 5 % more, `> 0.5` pays list price, anything lower gets half
/// off. Without an estimate the base price is returned unchanged.
#[must_use]
pub fn price_for(base_price: Decimal, willingness: Option<f64>) -> PriceAdjustment {
    let discount_percent = match willingness {
        None => 0,
        Some(w) if w > 0.8 => -5,
        Some(w) if w > 0.5 => 0,
        Some(_) => 50,
    };
    let factor = Decimal::from(100 - discount_percent) / Decimal::ONE_HUNDRED;
    PriceAdjustment {
        base_price,
        price: round_to_cents(base_price * factor),
        discount_percent,
    }
}

/// Rotating "other shoppers" notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialProof {
    pub count: u32,
    pub message: String,
}

const SOCIAL_PROOF: [(u32, u32, &str); 4] = [
    (10, 50, "people are looking at this"),
    (3, 20, "people bought in the last 10 minutes"),
    (1, 5, "people added a product to their cart"),
    (1, 2, "people are buying right now"),
];

pub fn social_proof<R: Rng + ?Sized>(rng: &mut R) -> SocialProof {
    let (min, max, text) = SOCIAL_PROOF
        .choose(rng)
        .copied()
        .unwrap_or(SOCIAL_PROOF[0]);
    let count = rng.random_range(min..=max);
    SocialProof {
        count,
        message: format!("{count} {text}"),
    }
}

const ENGAGED_BOOST: f64 = 10.0;
const JITTER: f64 = 5.0;

/// Pick up to `n` items to recommend.
///
/// With more than five samples every item scores a random jitter in
/// `[0, 5)`, plus a flat boost when the population is engaged, and the top
/// `n` are returned. Otherwise the items are shuffled.
pub fn recommend<'a, T, R>(
    items: &'a [T],
    averages: Option<&BehaviorAverages>,
    n: usize,
    rng: &mut R,
) -> Vec<&'a T>
where
    R: Rng + ?Sized,
{
    let Some(averages) = averages.filter(|a| a.sample_count > 5) else {
        let mut picked: Vec<&T> = items.iter().collect();
        picked.shuffle(rng);
        picked.truncate(n);
        return picked;
    };

    let engaged = averages.scroll > 0.5 && averages.time > 5_000.0 && averages.clicks > 3.0;
    let boost = if engaged { ENGAGED_BOOST } else { 0.0 };

    let mut scored: Vec<(f64, &T)> = items
        .iter()
        .map(|item| (boost + rng.random_range(0.0..JITTER), item))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(n).map(|(_, item)| item).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::str::FromStr;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn averages(count: u64, scroll: f64, time: f64, clicks: f64) -> BehaviorAverages {
        BehaviorAverages {
            sample_count: count,
            scroll,
            time,
            clicks,
            cta_seen_rate: 0.0,
            conversion_rate: 0.0,
        }
    }

    #[test]
    fn test_urgency_tiers() {
        assert_eq!(urgency_for(0.39), None);
        assert_eq!(urgency_for(0.40), Some(UrgencyTier::Viewers));
        assert_eq!(urgency_for(0.549), Some(UrgencyTier::Viewers));
        assert_eq!(urgency_for(0.55), Some(UrgencyTier::Viral));
        assert_eq!(urgency_for(0.7), Some(UrgencyTier::LowStock));
        assert_eq!(urgency_for(0.8), Some(UrgencyTier::HighDemand));
        assert_eq!(urgency_for(0.85), Some(UrgencyTier::LastUnit));
        assert_eq!(urgency_for(1.0), Some(UrgencyTier::LastUnit));
        assert_eq!(urgency_for(f64::NAN), None);
    }

    #[test]
    fn test_urgency_cta_only_on_upper_tiers() {
        assert!(UrgencyTier::Viral.cta().is_none());
        assert_eq!(UrgencyTier::LastUnit.cta(), Some("Buy now"));
    }

    #[test]
    fn test_cta_for() {
        assert_eq!(cta_for(0.71), CtaOffer::BuyNow);
        assert_eq!(cta_for(0.7), CtaOffer::Discount);
        assert_eq!(cta_for(0.41), CtaOffer::Discount);
        assert_eq!(cta_for(0.4), CtaOffer::FreeGuide);
    }

    #[test]
    fn test_testimonial_category_rules() {
        assert_eq!(testimonial_category(&averages(2, 0.9, 30_000.0, 20.0)), None);
        assert_eq!(
            testimonial_category(&averages(3, 0.1, 25_000.0, 11.0)),
            Some(TestimonialCategory::Quality)
        );
        assert_eq!(
            testimonial_category(&averages(3, 0.9, 25_000.0, 2.0)),
            Some(TestimonialCategory::Usability)
        );
        assert_eq!(
            testimonial_category(&averages(3, 0.2, 12_000.0, 2.0)),
            Some(TestimonialCategory::Value)
        );
        assert_eq!(
            testimonial_category(&averages(3, 0.2, 1_000.0, 6.0)),
            Some(TestimonialCategory::Support)
        );
        assert_eq!(
            testimonial_category(&averages(3, 0.2, 1_000.0, 1.0)),
            Some(TestimonialCategory::Speed)
        );
    }

    #[test]
    fn test_select_testimonial_by_category() {
        let mut rng = StdRng::seed_from_u64(1);
        let avg = averages(10, 0.9, 0.0, 0.0);
        let picked = select_testimonial(Some(&avg), &mut rng);
        assert_eq!(picked.category, TestimonialCategory::Usability);
        assert!(TESTIMONIALS.contains(select_testimonial(None, &mut rng)));
    }

    #[test]
    fn test_price_for() {
        let base = Decimal::from_str("20.00").unwrap();
        assert_eq!(price_for(base, None).price, base);
        assert_eq!(price_for(base, Some(0.9)).price, Decimal::from_str("21.00").unwrap());
        assert_eq!(price_for(base, Some(0.9)).discount_percent, -5);
        assert_eq!(price_for(base, Some(0.6)).price, base);
        assert_eq!(price_for(base, Some(0.2)).price, Decimal::from_str("10.00").unwrap());
    }

    #[test]
    fn test_price_rounds_to_cents() {
        let base = Decimal::from_str("19.99").unwrap();
        assert_eq!(price_for(base, Some(0.95)).price, Decimal::from_str("20.99").unwrap());
    }

    #[test]
    fn test_social_proof_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let notice = social_proof(&mut rng);
            assert!((1..=50).contains(&notice.count));
            assert!(notice.message.starts_with(&notice.count.to_string()));
        }
    }

    #[test]
    fn test_recommend_returns_up_to_n() {
        let mut rng = StdRng::seed_from_u64(9);
        let items = ["a", "b", "c", "d"];
        assert_eq!(recommend(&items, None, 2, &mut rng).len(), 2);

        let engaged = averages(20, 0.7, 8_000.0, 5.0);
        let picked = recommend(&items, Some(&engaged), 2, &mut rng);
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);

        assert_eq!(recommend(&items, Some(&engaged), 10, &mut rng).len(), 4);
    }
}
