// utils/geo.rs
use serde::Serialize;

const EARTH_RADIUS_KM: f64 = 6371.0088;

pub const NEARBY_JOBS_RADIUS_KM: f64 = 25.0;
pub const RESPONDER_RADIUS_KM: f64 = 10.0;
pub const HOSPITAL_RADIUS_KM: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn from_options(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

/// Great-circle distance in km; infinity when either side has no location.
pub fn distance_km(a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return f64::INFINITY,
    };
    if !(a.lat.is_finite() && a.lng.is_finite() && b.lat.is_finite() && b.lng.is_finite()) {
        return f64::INFINITY;
    }

    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Keeps items within `max_km` of `origin`, nearest first, paired with their distance.
pub fn within_radius<T, F>(origin: GeoPoint, items: Vec<T>, max_km: Option<f64>, location_of: F) -> Vec<(T, f64)>
where
    F: Fn(&T) -> Option<GeoPoint>,
{
    let mut with_distance: Vec<(T, f64)> = items
        .into_iter()
        .map(|item| {
            let d = distance_km(Some(origin), location_of(&item));
            (item, d)
        })
        .filter(|(_, d)| d.is_finite() && max_km.map_or(true, |max| *d <= max))
        .collect();

    with_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    with_distance
}

#[derive(Debug, Clone, Serialize)]
pub struct Hospital {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

pub const HOSPITALS: [Hospital; 4] = [
    Hospital { name: "Apollo Hospital Jubilee Hills", lat: 17.4182, lng: 78.4099 },
    Hospital { name: "Care Hospitals Banjara Hills", lat: 17.4152, lng: 78.4496 },
    Hospital { name: "Yashoda Hospitals Somajiguda", lat: 17.4227, lng: 78.4571 },
    Hospital { name: "Osmania General Hospital", lat: 17.3728, lng: 78.4760 },
];

#[derive(Debug, Clone, Serialize)]
pub struct NearbyHospital {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub distance_km: f64,
}

pub fn hospitals_near(origin: Option<GeoPoint>, radius_km: f64) -> Vec<NearbyHospital> {
    let Some(origin) = origin else {
        return Vec::new();
    };

    within_radius(origin, HOSPITALS.to_vec(), Some(radius_km), |h| {
        Some(GeoPoint::new(h.lat, h.lng))
    })
    .into_iter()
    .map(|(h, d)| NearbyHospital {
        name: h.name,
        lat: h.lat,
        lng: h.lng,
        distance_km: (d * 100.0).round() / 100.0,
    })
    .collect()
}

pub fn google_maps_link(lat: f64, lng: f64) -> String {
    format!("https://www.google.com/maps?q={},{}", lat, lng)
}
