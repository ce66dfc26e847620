//! Synthetic multi-locale addresses for exercising the classifier.

use std::collections::HashSet;
use std::path::Path;

use rand::Rng;

use crate::error::AppError;

/// Locale styles addresses are drawn from, with the country each one is in.
pub const LOCALES: [(Locale, &str); 7] = [
    (Locale::EnUs, "US"),
    (Locale::EnGb, "GB"),
    (Locale::DeDe, "DE"),
    (Locale::FrFr, "FR"),
    (Locale::EsEs, "ES"),
    (Locale::JaJp, "JP"),
    (Locale::EnAu, "AU"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    EnUs,
    EnGb,
    DeDe,
    FrFr,
    EsEs,
    JaJp,
    EnAu,
}

const US_STREETS: &[&str] = &["Maple", "Oak", "Washington", "Lake", "Hill", "Park", "Cedar", "Elm", "Lincoln", "Sunset"];
const US_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Boulevard", "Drive", "Lane", "Court"];
const US_CITIES: &[(&str, &str)] = &[
    ("Springfield", "IL"),
    ("Austin", "TX"),
    ("Portland", "OR"),
    ("Columbus", "OH"),
    ("Denver", "CO"),
    ("Raleigh", "NC"),
    ("Madison", "WI"),
    ("Tucson", "AZ"),
];

const GB_STREETS: &[&str] = &["High", "Station", "Church", "Victoria", "Mill", "Queen's", "King's", "Manor"];
const GB_SUFFIXES: &[&str] = &["Street", "Road", "Lane", "Close", "Way", "Gardens"];
const GB_TOWNS: &[(&str, &str)] = &[
    ("London", "SW"),
    ("Leeds", "LS"),
    ("Bristol", "BS"),
    ("Manchester", "M"),
    ("Glasgow", "G"),
    ("Cardiff", "CF"),
    ("York", "YO"),
];

const DE_STREETS: &[&str] = &["Haupt", "Bahnhof", "Schul", "Garten", "Berg", "Kirch", "Linden", "Wald"];
const DE_CITIES: &[&str] = &["Berlin", "Hamburg", "München", "Köln", "Leipzig", "Dresden", "Bremen", "Stuttgart"];

const FR_STREETS: &[&str] = &["de la Paix", "Victor Hugo", "du Moulin", "Pasteur", "de l'Église", "Jean Jaurès", "des Lilas"];
const FR_CITIES: &[&str] = &["Paris", "Lyon", "Marseille", "Toulouse", "Nantes", "Bordeaux", "Lille", "Rennes"];

const ES_STREETS: &[&str] = &["Mayor", "Real", "de la Paz", "del Sol", "San Juan", "de Cervantes", "Nueva"];
const ES_CITIES: &[&str] = &["Madrid", "Barcelona", "Sevilla", "Valencia", "Bilbao", "Málaga", "Zaragoza"];

const JP_PREFECTURES: &[(&str, &[&str])] = &[
    ("東京都", &["渋谷区", "新宿区", "港区", "世田谷区"]),
    ("大阪府", &["大阪市北区", "堺市", "豊中市"]),
    ("北海道", &["札幌市中央区", "函館市"]),
    ("京都府", &["京都市左京区", "宇治市"]),
    ("福岡県", &["福岡市博多区", "北九州市"]),
];

const AU_STREETS: &[&str] = &["George", "Bourke", "Queen", "Collins", "Elizabeth", "Pitt", "Hunter", "Murray"];
const AU_SUFFIXES: &[&str] = &["Street", "Road", "Parade", "Terrace", "Crescent", "Avenue"];
const AU_SUBURBS: &[(&str, &str, u32)] = &[
    ("Sydney", "NSW", 2000),
    ("Melbourne", "VIC", 3000),
    ("Brisbane", "QLD", 4000),
    ("Perth", "WA", 6000),
    ("Adelaide", "SA", 5000),
    ("Hobart", "TAS", 7000),
];

fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> &'a T {
    // Every table above is non-empty.
    &items[rng.gen_range(0..items.len())]
}

/// One single-line address in the style of `locale`.
pub fn address<R: Rng + ?Sized>(rng: &mut R, locale: Locale) -> String {
    match locale {
        Locale::EnUs => {
            let (city, state) = pick(rng, US_CITIES);
            format!(
                "{} {} {}, {}, {} {:05}",
                rng.gen_range(1..9999),
                pick(rng, US_STREETS),
                pick(rng, US_SUFFIXES),
                city,
                state,
                rng.gen_range(501..99950)
            )
        }
        Locale::EnGb => {
            let (town, area) = pick(rng, GB_TOWNS);
            let letters: &[u8] = b"ABDEFGHJLNPQRSTUWXYZ";
            format!(
                "{} {} {}, {}, {}{} {}{}{}",
                rng.gen_range(1..300),
                pick(rng, GB_STREETS),
                pick(rng, GB_SUFFIXES),
                town,
                area,
                rng.gen_range(1..20),
                rng.gen_range(1..10),
                *pick(rng, letters) as char,
                *pick(rng, letters) as char
            )
        }
        Locale::DeDe => format!(
            "{}straße {}, {:05} {}",
            pick(rng, DE_STREETS),
            rng.gen_range(1..200),
            rng.gen_range(1067..99999),
            pick(rng, DE_CITIES)
        ),
        Locale::FrFr => format!(
            "{}, rue {}, {:05} {}",
            rng.gen_range(1..150),
            pick(rng, FR_STREETS),
            rng.gen_range(1000..95999),
            pick(rng, FR_CITIES)
        ),
        Locale::EsEs => format!(
            "Calle {}, {}, {:05} {}",
            pick(rng, ES_STREETS),
            rng.gen_range(1..120),
            rng.gen_range(1001..52999),
            pick(rng, ES_CITIES)
        ),
        Locale::JaJp => {
            let (prefecture, cities) = pick(rng, JP_PREFECTURES);
            format!(
                "〒{:03}-{:04} {}{}{}-{}-{}",
                rng.gen_range(100..999),
                rng.gen_range(0..9999),
                prefecture,
                pick(rng, *cities),
                rng.gen_range(1..10),
                rng.gen_range(1..30),
                rng.gen_range(1..20)
            )
        }
        Locale::EnAu => {
            let (suburb, state, base) = pick(rng, AU_SUBURBS);
            format!(
                "{} {} {}, {} {} {}",
                rng.gen_range(1..500),
                pick(rng, AU_STREETS),
                pick(rng, AU_SUFFIXES),
                suburb,
                state,
                base + rng.gen_range(0..100)
            )
        }
    }
}

/// Draws `count` distinct addresses across all locales.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Result<Vec<String>, AppError> {
    let max_draws = count.saturating_mul(100).max(1000);
    let mut seen = HashSet::with_capacity(count);
    let mut addresses = Vec::with_capacity(count);

    let mut draws = 0usize;
    while addresses.len() < count {
        if draws >= max_draws {
            return Err(AppError::InvalidConfiguration(format!(
                "could not generate {count} distinct addresses"
            )));
        }
        draws += 1;
        let (locale, _) = *pick(rng, &LOCALES[..]);
        let candidate = address(rng, locale);
        if seen.insert(candidate.clone()) {
            addresses.push(candidate);
        }
    }
    Ok(addresses)
}

/// Writes `addresses` under an `address` header, truncating `path`.
pub fn write_csv(path: &Path, addresses: &[String]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["address"])?;
    for address in addresses {
        writer.write_record([address])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_addresses;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generates_requested_number_of_unique_addresses() {
        let mut rng = StdRng::seed_from_u64(7);
        let addresses = generate(&mut rng, 500).unwrap();
        assert_eq!(addresses.len(), 500);
        let unique: HashSet<_> = addresses.iter().collect();
        assert_eq!(unique.len(), 500);
        assert!(addresses.iter().all(|a| !a.contains('\n') && !a.trim().is_empty()));
    }

    #[test]
    fn same_seed_same_output() {
        let a = generate(&mut StdRng::seed_from_u64(42), 50).unwrap();
        let b = generate(&mut StdRng::seed_from_u64(42), 50).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn every_locale_produces_an_address() {
        let mut rng = StdRng::seed_from_u64(1);
        for (locale, _) in LOCALES {
            let text = address(&mut rng, locale);
            assert!(text.contains(", ") || locale == Locale::JaJp, "{text}");
        }
    }

    #[test]
    fn written_file_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_addresses.csv");
        let addresses = generate(&mut StdRng::seed_from_u64(3), 20).unwrap();
        write_csv(&path, &addresses).unwrap();

        let loaded: Vec<_> = load_addresses(&path)
            .unwrap()
            .into_iter()
            .map(|record| record.text)
            .collect();
        assert_eq!(loaded, addresses);
    }
}
