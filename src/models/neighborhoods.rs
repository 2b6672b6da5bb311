// ============================================
// Toronto Neighborhood Reference Data
// ============================================
//
// Canonical neighborhood centres. Catalog items that carry raw coordinates
// but no declared neighborhood are labelled with the nearest centre so the
// neighborhood boost and contextual filters can still match them. Curated
// list; a fuller deployment would swap in a boundary dataset.

use once_cell::sync::Lazy;

/// One canonical neighborhood centre.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

pub static TORONTO_NEIGHBORHOODS: Lazy<Vec<Neighborhood>> = Lazy::new(|| {
    vec![
        Neighborhood {
            name: "Downtown Core",
            latitude: 43.6511,
            longitude: -79.3832,
        },
        Neighborhood {
            name: "Distillery District",
            latitude: 43.6503,
            longitude: -79.3597,
        },
        Neighborhood {
            name: "Kensington Market",
            latitude: 43.6547,
            longitude: -79.4005,
        },
        Neighborhood {
            name: "The Beaches",
            latitude: 43.6762,
            longitude: -79.2995,
        },
        Neighborhood {
            name: "Yorkville",
            latitude: 43.6709,
            longitude: -79.3933,
        },
        Neighborhood {
            name: "Queen West",
            latitude: 43.6468,
            longitude: -79.4119,
        },
        Neighborhood {
            name: "Liberty Village",
            latitude: 43.6371,
            longitude: -79.4208,
        },
        Neighborhood {
            name: "Leslieville",
            latitude: 43.6626,
            longitude: -79.3357,
        },
        Neighborhood {
            name: "Little Italy",
            latitude: 43.6547,
            longitude: -79.4228,
        },
        Neighborhood {
            name: "Chinatown",
            latitude: 43.6529,
            longitude: -79.3975,
        },
    ]
});

/// Nearest canonical centre by squared degree distance. The centres sit
/// close enough together that the flat approximation picks the same winner
/// a geodesic distance would.
pub fn nearest_neighborhood(latitude: f64, longitude: f64) -> &'static Neighborhood {
    let mut nearest = &TORONTO_NEIGHBORHOODS[0];
    let mut nearest_distance = f64::INFINITY;

    for neighborhood in TORONTO_NEIGHBORHOODS.iter() {
        let distance = (neighborhood.latitude - latitude).powi(2)
            + (neighborhood.longitude - longitude).powi(2);
        if distance < nearest_distance {
            nearest_distance = distance;
            nearest = neighborhood;
        }
    }

    nearest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_centre_coordinates_resolve_to_that_neighborhood() {
        let hood = nearest_neighborhood(43.6547, -79.4005);
        assert_eq!(hood.name, "Kensington Market");
    }

    #[test]
    fn test_cn_tower_grounds_resolve_to_the_downtown_core() {
        let hood = nearest_neighborhood(43.6426, -79.3871);
        assert_eq!(hood.name, "Downtown Core");
    }

    #[test]
    fn test_east_end_point_resolves_to_the_beaches() {
        let hood = nearest_neighborhood(43.6800, -79.3000);
        assert_eq!(hood.name, "The Beaches");
    }
}
