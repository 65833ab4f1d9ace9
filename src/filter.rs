//! Job search filters, evaluated in memory over the whole job list.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::models::Job;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// The first run of digits in a display string ("₹12L" -> 12). Strings
/// without one count as 0.
pub fn parse_leading_number(s: &str) -> u32 {
    NUMBER
        .find(s)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// A `min-max` or `min+` range of whole numbers; `max` is `None` when open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub min: u32,
    pub max: Option<u32>,
}

impl Band {
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(min) = s.strip_suffix('+') {
            let min = min.trim().parse().map_err(|_| format!("invalid band '{}'", s))?;
            return Ok(Band::new(min, None));
        }
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid band '{}' (expected min-max or min+)", s))?;
        let min: u32 = min.trim().parse().map_err(|_| format!("invalid band '{}'", s))?;
        let max: u32 = max.trim().parse().map_err(|_| format!("invalid band '{}'", s))?;
        if max < min {
            return Err(format!("invalid band '{}' (max below min)", s));
        }
        Ok(Band::new(min, Some(max)))
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}-{}", self.min, max),
            None => write!(f, "{}+", self.min),
        }
    }
}

/// Salary bucket in the display unit (lakhs). Half-open: `10-20` holds 10
/// up to but not including 20.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalaryBand(pub Band);

impl SalaryBand {
    pub const STANDARD: [SalaryBand; 3] = [
        SalaryBand(Band::new(0, Some(10))),
        SalaryBand(Band::new(10, Some(20))),
        SalaryBand(Band::new(20, None)),
    ];

    pub fn contains(&self, value: u32) -> bool {
        value >= self.0.min && self.0.max.is_none_or(|max| value < max)
    }

    pub fn matches(&self, salary: &str) -> bool {
        self.contains(parse_leading_number(salary))
    }
}

impl FromStr for SalaryBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(SalaryBand)
    }
}

impl fmt::Display for SalaryBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Experience bucket in years. Matches any job whose range overlaps it,
/// ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceBand(pub Band);

impl ExperienceBand {
    pub const STANDARD: [ExperienceBand; 4] = [
        ExperienceBand(Band::new(0, Some(2))),
        ExperienceBand(Band::new(2, Some(5))),
        ExperienceBand(Band::new(5, Some(10))),
        ExperienceBand(Band::new(10, None)),
    ];

    pub fn overlaps(&self, range: &ExperienceRange) -> bool {
        let band_max = self.0.max.unwrap_or(u32::MAX);
        let range_max = range.max.unwrap_or(u32::MAX);
        range.min <= band_max && self.0.min <= range_max
    }

    pub fn matches(&self, experience: &str) -> bool {
        self.overlaps(&ExperienceRange::parse(experience))
    }
}

impl FromStr for ExperienceBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ExperienceBand)
    }
}

impl fmt::Display for ExperienceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A job's experience requirement as written on the posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceRange {
    pub min: u32,
    pub max: Option<u32>,
}

impl ExperienceRange {
    /// Reads "2-5", "5+", "3" or "2 - 5 years". Text without numbers reads
    /// as 0-0.
    pub fn parse(s: &str) -> Self {
        let numbers: Vec<u32> = NUMBER
            .find_iter(s)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        match numbers.as_slice() {
            [] => Self { min: 0, max: Some(0) },
            [n] if s.contains('+') => Self { min: *n, max: None },
            [n] => Self { min: *n, max: Some(*n) },
            [a, b, ..] => Self {
                min: *a.min(b),
                max: Some(*a.max(b)),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub title: Option<String>,
    pub location: Option<String>,
    pub experience: Option<ExperienceBand>,
    pub salary: Option<SalaryBand>,
}

impl JobFilter {
    pub fn is_empty(&self) -> bool {
        blank(&self.title) && blank(&self.location) && self.experience.is_none() && self.salary.is_none()
    }

    /// True when the job meets every criterion that is set.
    pub fn matches(&self, job: &Job) -> bool {
        contains_ignore_case(&job.title, self.title.as_deref())
            && contains_ignore_case(&job.location, self.location.as_deref())
            && self.experience.is_none_or(|band| band.matches(&job.experience_range))
            && self.salary.is_none_or(|band| band.matches(&job.salary))
    }

    pub fn apply(&self, jobs: &[Job]) -> Vec<Job> {
        jobs.iter().filter(|j| self.matches(j)).cloned().collect()
    }
}

fn blank(s: &Option<String>) -> bool {
    s.as_deref().is_none_or(|s| s.trim().is_empty())
}

fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    fn job(title: &str, location: &str, salary: &str, experience: &str) -> Job {
        Job {
            id: 1,
            title: title.to_string(),
            company: "Acme".to_string(),
            company_email: None,
            location: location.to_string(),
            salary: salary.to_string(),
            experience_range: experience.to_string(),
            status: JobStatus::Active,
            description: String::new(),
            job_type: None,
            skills: vec![],
            posted_date: None,
        }
    }

    fn band(s: &str) -> SalaryBand {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("₹12L"), 12);
        assert_eq!(parse_leading_number("₹10L - ₹15L"), 10);
        assert_eq!(parse_leading_number("Competitive"), 0);
        assert_eq!(parse_leading_number(""), 0);
    }

    #[test]
    fn test_salary_bands() {
        assert!(band("10-20").matches("₹12L"));
        assert!(!band("10-20").matches("₹9L"));
        assert!(band("0-10").matches("₹9L"));

        assert!(band("0-10").matches("Negotiable"));
        assert!(!band("10-20").matches("Negotiable"));
        assert!(!band("20+").matches("Negotiable"));

        // Boundaries belong to the upper bucket.
        assert!(!band("0-10").matches("₹10L"));
        assert!(band("10-20").matches("₹10L"));
        assert!(band("20+").matches("₹45L"));
    }

    #[test]
    fn test_band_parse() {
        assert_eq!("5+".parse::<Band>().unwrap(), Band::new(5, None));
        assert_eq!(" 2 - 5 ".parse::<Band>().unwrap(), Band::new(2, Some(5)));
        assert!("5-2".parse::<Band>().is_err());
        assert!("five".parse::<Band>().is_err());
        assert_eq!(Band::new(10, None).to_string(), "10+");
    }

    #[test]
    fn test_experience_range_parse() {
        assert_eq!(ExperienceRange::parse("2-5"), ExperienceRange { min: 2, max: Some(5) });
        assert_eq!(ExperienceRange::parse("5+ years"), ExperienceRange { min: 5, max: None });
        assert_eq!(ExperienceRange::parse("3"), ExperienceRange { min: 3, max: Some(3) });
        assert_eq!(ExperienceRange::parse("Fresher"), ExperienceRange { min: 0, max: Some(0) });
    }

    #[test]
    fn test_experience_overlap() {
        let junior: ExperienceBand = "0-2".parse().unwrap();
        let mid: ExperienceBand = "2-5".parse().unwrap();
        let senior: ExperienceBand = "10+".parse().unwrap();

        assert!(junior.matches("1-3"));
        assert!(mid.matches("1-3"));
        assert!(!senior.matches("1-3"));
        assert!(senior.matches("8+"));
        assert!(mid.matches("5+"));
        assert!(junior.matches("Fresher"));
        assert!(!mid.matches("Fresher"));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let jobs = vec![
            job("Senior Rust Engineer", "Bengaluru", "₹25L", "5+"),
            job("Rust Engineer", "Pune", "₹12L", "3-5"),
            job("Frontend Developer", "Bengaluru", "₹12L", "1-3"),
        ];

        assert_eq!(JobFilter::default().apply(&jobs).len(), 3);

        let filter = JobFilter {
            title: Some("rust".into()),
            location: Some("BENGAL".into()),
            ..Default::default()
        };
        let found = filter.apply(&jobs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Senior Rust Engineer");

        let filter = JobFilter {
            salary: Some(band("10-20")),
            experience: Some("0-2".parse().unwrap()),
            ..Default::default()
        };
        let found = filter.apply(&jobs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Frontend Developer");
    }

    #[test]
    fn test_filter_is_repeatable_and_ignores_blank_text() {
        let jobs = vec![
            job("Rust Engineer", "Pune", "₹12L", "2-5"),
            job("Data Analyst", "Remote", "₹8L", "0-2"),
        ];
        let filter = JobFilter {
            title: Some("  ".into()),
            salary: Some(band("0-10")),
            ..Default::default()
        };
        assert!(!filter.is_empty());
        let first = filter.apply(&jobs);
        let second = filter.apply(&jobs);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert!(JobFilter { title: Some(" ".into()), ..Default::default() }.is_empty());
    }
}
