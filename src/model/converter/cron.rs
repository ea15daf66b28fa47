//! POSIX cron syntax for `on.schedule`

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

struct Field {
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const FIELDS: [Field; 5] = [
    // minute
    Field { min: 0, max: 59, names: &[] },
    // hour
    Field { min: 0, max: 23, names: &[] },
    // day of month
    Field { min: 1, max: 31, names: &[] },
    Field { min: 1, max: 12, names: &MONTHS },
    Field { min: 0, max: 6, names: &WEEKDAYS },
];

/// Five whitespace separated fields, each a comma separated list of `*`,
/// values or ranges with an optional `/step`.
pub fn is_valid_cron(cron: &str) -> bool {
    let parts: Vec<&str> = cron.split_whitespace().collect();
    parts.len() == FIELDS.len()
        && parts
            .iter()
            .zip(FIELDS.iter())
            .all(|(part, field)| is_valid_field(part, field))
}

fn is_valid_field(part: &str, field: &Field) -> bool {
    part.split(',').all(|item| is_valid_item(item, field))
}

fn is_valid_item(item: &str, field: &Field) -> bool {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };

    if let Some(step) = step {
        match step.parse::<u32>() {
            Ok(step) if step > 0 && step <= field.max => {}
            _ => return false,
        }
    }

    if range == "*" {
        return true;
    }

    match range.split_once('-') {
        Some((start, end)) => match (value(start, field), value(end, field)) {
            (Some(start), Some(end)) => start <= end,
            _ => false,
        },
        None => value(range, field).is_some(),
    }
}

fn value(text: &str, field: &Field) -> Option<u32> {
    let value = match text.parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            let index = field
                .names
                .iter()
                .position(|name| name.eq_ignore_ascii_case(text))?;
            field.min + index as u32
        }
    };
    (field.min..=field.max).contains(&value).then_some(value)
}
