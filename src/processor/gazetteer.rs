use crate::models::{Location, Region};

const STATE_ALIASES: &[(&str, Region)] = &[
    ("new delhi", Region::Delhi),
    ("tamilnadu", Region::TamilNadu),
    ("orissa", Region::Odisha),
    ("uttaranchal", Region::Uttarakhand),
    ("chattisgarh", Region::Chhattisgarh),
    ("jammu kashmir", Region::JammuAndKashmir),
];

const CITY_ALIASES: &[(&str, Region)] = &[
    ("mumbai", Region::Maharashtra),
    ("bombay", Region::Maharashtra),
    ("navi mumbai", Region::Maharashtra),
    ("thane", Region::Maharashtra),
    ("pune", Region::Maharashtra),
    ("nagpur", Region::Maharashtra),
    ("nashik", Region::Maharashtra),
    ("aurangabad", Region::Maharashtra),
    ("ahmedabad", Region::Gujarat),
    ("surat", Region::Gujarat),
    ("vadodara", Region::Gujarat),
    ("baroda", Region::Gujarat),
    ("rajkot", Region::Gujarat),
    ("bangalore", Region::Karnataka),
    ("bengaluru", Region::Karnataka),
    ("mysore", Region::Karnataka),
    ("mysuru", Region::Karnataka),
    ("chennai", Region::TamilNadu),
    ("madras", Region::TamilNadu),
    ("coimbatore", Region::TamilNadu),
    ("madurai", Region::TamilNadu),
    ("tiruppur", Region::TamilNadu),
    ("kolkata", Region::WestBengal),
    ("calcutta", Region::WestBengal),
    ("howrah", Region::WestBengal),
    ("hyderabad", Region::Telangana),
    ("secunderabad", Region::Telangana),
    ("jaipur", Region::Rajasthan),
    ("jodhpur", Region::Rajasthan),
    ("udaipur", Region::Rajasthan),
    ("lucknow", Region::UttarPradesh),
    ("kanpur", Region::UttarPradesh),
    ("noida", Region::UttarPradesh),
    ("ghaziabad", Region::UttarPradesh),
    ("agra", Region::UttarPradesh),
    ("varanasi", Region::UttarPradesh),
    ("gurgaon", Region::Haryana),
    ("gurugram", Region::Haryana),
    ("faridabad", Region::Haryana),
    ("indore", Region::MadhyaPradesh),
    ("bhopal", Region::MadhyaPradesh),
    ("ludhiana", Region::Punjab),
    ("amritsar", Region::Punjab),
    ("jalandhar", Region::Punjab),
    ("visakhapatnam", Region::AndhraPradesh),
    ("vizag", Region::AndhraPradesh),
    ("vijayawada", Region::AndhraPradesh),
    ("kochi", Region::Kerala),
    ("cochin", Region::Kerala),
    ("thiruvananthapuram", Region::Kerala),
    ("patna", Region::Bihar),
    ("bhubaneswar", Region::Odisha),
    ("guwahati", Region::Assam),
    ("ranchi", Region::Jharkhand),
    ("jamshedpur", Region::Jharkhand),
    ("raipur", Region::Chhattisgarh),
    ("dehradun", Region::Uttarakhand),
    ("shimla", Region::HimachalPradesh),
    ("srinagar", Region::JammuAndKashmir),
];

const COUNTRIES: &[&str] = &[
    "india", "china", "cn", "hong kong", "hk", "usa", "united states", "uk", "taiwan", "vietnam",
];

/// Fixed table of state names and aliases used to resolve free-text locations.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    states: Vec<(String, Region)>,
    cities: Vec<(String, Region)>,
}

impl Gazetteer {
    pub fn new() -> Self {
        let mut states: Vec<(String, Region)> = Region::KNOWN
            .iter()
            .map(|region| (phrase(region.name()), *region))
            .chain(STATE_ALIASES.iter().map(|(alias, region)| (phrase(alias), *region)))
            .collect();
        let mut cities: Vec<(String, Region)> = CITY_ALIASES
            .iter()
            .map(|(alias, region)| (phrase(alias), *region))
            .collect();

        // Longer phrases first so "navi mumbai" wins over "mumbai".
        states.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        cities.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self { states, cities }
    }

    /// Region named anywhere in `text`; state names take priority over cities.
    pub fn lookup(&self, text: &str) -> Region {
        let padded = format!(" {} ", phrase(text));
        self.states
            .iter()
            .chain(self.cities.iter())
            .find(|(alias, _)| padded.contains(&format!(" {} ", alias)))
            .map_or(Region::Unknown, |(_, region)| *region)
    }

    pub fn parse_location(&self, text: &str) -> Location {
        let state = self.lookup(text);
        let city = text
            .split(',')
            .next()
            .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|segment| segment.chars().any(char::is_alphabetic))
            .filter(|segment| !self.is_region_or_country(segment))
            .map(|segment| title_case(&segment));

        Location { city, state }
    }

    fn is_region_or_country(&self, segment: &str) -> bool {
        let key = phrase(segment);
        COUNTRIES.contains(&key.as_str()) || self.states.iter().any(|(alias, _)| *alias == key)
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased words separated by single spaces, punctuation dropped.
fn phrase(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            if word.len() <= 4 && word.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
