//! URL categorization
//!
//! Every storefront URL belongs to exactly one (country, brand) pair. The
//! mapping is a substring match against the storefront domains, checked in a
//! fixed priority order so that country-code-like fragments never shadow each
//! other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::constants::storefronts::{NINJA_DOMAIN, SHARK_DOMAIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "FR")]
    France,
    #[serde(rename = "ES")]
    Spain,
    #[serde(rename = "BE")]
    Belgium,
    #[serde(rename = "NL")]
    Netherlands,
}

impl Country {
    /// Countries in categorization priority order.
    pub const PRIORITY: [Self; 4] = [Self::France, Self::Spain, Self::Belgium, Self::Netherlands];

    pub const fn code(self) -> &'static str {
        match self {
            Self::France => "FR",
            Self::Spain => "ES",
            Self::Belgium => "BE",
            Self::Netherlands => "NL",
        }
    }

    /// Top-level domain of the country's storefronts
    pub const fn tld(self) -> &'static str {
        match self {
            Self::France => "fr",
            Self::Spain => "es",
            Self::Belgium => "be",
            Self::Netherlands => "nl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Brand {
    Ninja,
    Shark,
}

impl Brand {
    pub const ALL: [Self; 2] = [Self::Ninja, Self::Shark];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Ninja => "Ninja",
            Self::Shark => "Shark",
        }
    }

    const fn storefront(self) -> &'static str {
        match self {
            Self::Ninja => NINJA_DOMAIN,
            Self::Shark => SHARK_DOMAIN,
        }
    }

    /// Product line as shown in the page title.
    ///
    /// Independent of the storefront brand: a Ninja product listed on a Shark
    /// storefront keeps the `Ninja` line.
    pub fn from_title(title: &str) -> Self {
        if title.to_lowercase().contains("ninja") {
            Self::Ninja
        } else {
            Self::Shark
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl FromStr for Country {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PRIORITY
            .into_iter()
            .find(|country| country.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant { kind: "country", value: s.to_string() })
    }
}

impl FromStr for Brand {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|brand| brand.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant { kind: "brand", value: s.to_string() })
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A (country, brand) storefront pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category {
    pub country: Country,
    pub brand: Brand,
}

impl Category {
    pub const fn new(country: Country, brand: Brand) -> Self {
        Self { country, brand }
    }

    /// Categorize a URL by storefront domain.
    ///
    /// Checks France, Spain, Belgium, then the Netherlands; Ninja before Shark
    /// within each country. Returns `None` for any other URL.
    pub fn from_url(url: &str) -> Option<Self> {
        Country::PRIORITY.into_iter().find_map(|country| {
            Brand::ALL.into_iter().find_map(|brand| {
                let domain = format!("{}.{}", brand.storefront(), country.tld());
                url.contains(&domain).then_some(Self::new(country, brand))
            })
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.country, self.brand)
    }
}

/// Group URLs by category, dropping the ones no storefront claims.
///
/// Categories keep the order of their first URL; URLs keep their input order.
pub fn group_urls_by_category<I, S>(urls: I) -> (Vec<(Category, Vec<String>)>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut groups: Vec<(Category, Vec<String>)> = Vec::new();
    let mut uncategorized = Vec::new();

    for url in urls {
        let url = url.into();
        match Category::from_url(&url) {
            Some(category) => match groups.iter_mut().find(|(c, _)| *c == category) {
                Some((_, bucket)) => bucket.push(url),
                None => groups.push((category, vec![url])),
            },
            None => uncategorized.push(url),
        }
    }

    (groups, uncategorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://www.ninjakitchen.fr/zid111", Country::France, Brand::Ninja)]
    #[case("https://www.sharkclean.fr/aspirateur/zid222", Country::France, Brand::Shark)]
    #[case("https://www.ninjakitchen.es/zid333", Country::Spain, Brand::Ninja)]
    #[case("https://www.sharkclean.es/zid444", Country::Spain, Brand::Shark)]
    #[case("https://www.ninjakitchen.be/nl/zid555", Country::Belgium, Brand::Ninja)]
    #[case("https://www.sharkclean.be/fr/zid666", Country::Belgium, Brand::Shark)]
    #[case("https://www.ninjakitchen.nl/zid777", Country::Netherlands, Brand::Ninja)]
    #[case("https://www.sharkclean.nl/stofzuigers/zid123456", Country::Netherlands, Brand::Shark)]
    fn test_known_storefronts(#[case] url: &str, #[case] country: Country, #[case] brand: Brand) {
        assert_eq!(Category::from_url(url), Some(Category::new(country, brand)));
    }

    #[rstest]
    #[case("https://www.example.com/zid123")]
    #[case("https://www.ninjakitchen.de/zid123")]
    #[case("https://www.sharkclean.co.uk/zid123")]
    #[case("")]
    fn test_unknown_urls_are_dropped(#[case] url: &str) {
        assert_eq!(Category::from_url(url), None);
    }

    #[test]
    fn test_belgian_domain_never_matches_dutch_check() {
        let url = "https://www.sharkclean.be/nl/stofzuigers/zid42";
        assert_eq!(Category::from_url(url).map(|c| c.country), Some(Country::Belgium));
    }

    #[test]
    fn test_categorization_is_idempotent() {
        let url = "https://www.ninjakitchen.nl/product/zid9";
        let first = Category::from_url(url);
        for _ in 0..5 {
            assert_eq!(Category::from_url(url), first);
        }
    }

    #[test]
    fn test_product_line_from_title() {
        assert_eq!(Brand::from_title("NINJA Foodi MAX Dual Zone"), Brand::Ninja);
        assert_eq!(Brand::from_title("Shark Stick Vacuum"), Brand::Shark);
        assert_eq!(Brand::from_title("Airfryer 9,5 L"), Brand::Shark);
    }

    #[test]
    fn test_group_urls_keeps_order_and_drops_unknown() {
        let urls = vec![
            "https://www.sharkclean.nl/zid1",
            "https://www.ninjakitchen.fr/zid2",
            "https://unknown.example/zid3",
            "https://www.sharkclean.nl/zid4",
        ];

        let (groups, uncategorized) = group_urls_by_category(urls);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Category::new(Country::Netherlands, Brand::Shark));
        assert_eq!(groups[0].1, vec!["https://www.sharkclean.nl/zid1", "https://www.sharkclean.nl/zid4"]);
        assert_eq!(groups[1].0, Category::new(Country::France, Brand::Ninja));
        assert_eq!(uncategorized, vec!["https://unknown.example/zid3"]);
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!("nl".parse::<Country>(), Ok(Country::Netherlands));
        assert_eq!("SHARK".parse::<Brand>(), Ok(Brand::Shark));
        assert!("DE".parse::<Country>().is_err());
    }
}
