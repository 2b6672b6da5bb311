// ============================================
// City Context Helpers
// ============================================

use crate::models::Season;
use chrono::{Datelike, NaiveDate};

/// Canonical tag form of a neighborhood name: lowercased, spaces to
/// hyphens. "Queen West" tags as "queen-west".
pub fn neighborhood_slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Seasonal tags for a date: the season label plus the special windows
/// the event pipeline labels (December holidays, July festivals, Canada
/// Day, Halloween, Canadian Thanksgiving).
pub fn seasonal_tags_for(date: NaiveDate) -> Vec<String> {
    let month = date.month();
    let day = date.day();

    let mut tags = vec![Season::from_month(month).label().to_string()];

    if month == 12 {
        tags.push("holiday".to_string());
    }
    if month == 7 {
        tags.push("summer-festival".to_string());
    }
    if month == 7 && day == 1 {
        tags.push("canada-day".to_string());
    }
    if month == 10 && day >= 25 {
        tags.push("halloween".to_string());
    }
    if month == 10 && (8..=14).contains(&day) {
        tags.push("thanksgiving".to_string());
    }

    tags
}
