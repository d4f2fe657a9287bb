use chrono::{DateTime, Utc};

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

pub fn time_ago(dt: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(dt) = dt else {
        return "recently".to_string();
    };

    let diff = now - dt;
    let days = diff.num_days();
    let seconds = diff.num_seconds() - days * 86_400;

    if days > 365 {
        plural(days / 365, "year")
    } else if days > 30 {
        plural(days / 30, "month")
    } else if days > 0 {
        plural(days, "day")
    } else if seconds > 3600 {
        plural(seconds / 3600, "hour")
    } else if seconds > 60 {
        plural(seconds / 60, "minute")
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc::now();
        assert_eq!(time_ago(None, now), "recently");
        assert_eq!(time_ago(Some(now - Duration::seconds(30)), now), "just now");
        assert_eq!(time_ago(Some(now - Duration::minutes(5)), now), "5 minutes ago");
        assert_eq!(time_ago(Some(now - Duration::minutes(61)), now), "1 hour ago");
        assert_eq!(time_ago(Some(now - Duration::days(1)), now), "1 day ago");
        assert_eq!(time_ago(Some(now - Duration::days(45)), now), "1 month ago");
        assert_eq!(time_ago(Some(now - Duration::days(800)), now), "2 years ago");
    }
}
