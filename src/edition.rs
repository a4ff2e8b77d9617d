use chrono::{Datelike as _, NaiveDate, Weekday};

/// Naming for one day's paper. On Sundays the Guardian does not publish;
/// the Observer edition is built instead.
#[derive(Debug, Clone)]
pub struct Edition {
    pub date: NaiveDate,
    pub paper: &'static str,
}

impl Edition {
    pub fn for_date(date: NaiveDate) -> Self {
        let paper = if date.weekday() == Weekday::Sun {
            "The Observer"
        } else {
            "The Guardian"
        };
        Self { date, paper }
    }

    pub fn book_id(&self) -> String {
        format!("Guardian_{}", self.date)
    }

    pub fn title(&self) -> String {
        format!("{} on {}", self.paper, self.long_date())
    }

    pub fn short_title(&self) -> String {
        format!("{} (Unofficial)", self.paper)
    }

    pub fn basename(&self) -> String {
        format!("guardian-{}", self.date)
    }

    pub fn opf_filename(&self) -> String {
        format!("{}.opf", self.basename())
    }

    pub fn mobi_filename(&self) -> String {
        format!("{}.mobi", self.basename())
    }

    /// "Friday the 7th of August, 2026"
    pub fn long_date(&self) -> String {
        let day = self.date.day();
        format!(
            "{} the {}{} of {}, {}",
            self.date.format("%A"),
            day,
            ordinal_suffix(day),
            self.date.format("%B"),
            self.date.format("%Y"),
        )
    }

    pub fn index_url(&self) -> String {
        let listing = if self.date.weekday() == Weekday::Sun {
            "theobserver"
        } else {
            "theguardian"
        };
        format!("https://www.theguardian.com/{listing}/all")
    }

    pub fn logo_filename(&self) -> &'static str {
        if self.date.weekday() == Weekday::Sun {
            "observer-logo-500.png"
        } else {
            "guardian-logo-500.png"
        }
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match day % 100 {
        11..=13 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}
