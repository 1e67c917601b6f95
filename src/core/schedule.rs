use super::error::{AllocationError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulePoint {
    pub age: u32,
    pub value: f64,
}

impl SchedulePoint {
    pub fn new(age: u32, value: f64) -> Self {
        Self { age, value }
    }
}

/// Age-indexed values supplied by an external loader.
///
/// Between two known ages the value is linearly interpolated. Ages before the
/// first or after the last known age evaluate to zero; there is no
/// extrapolation.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    points: Vec<SchedulePoint>,
}

impl Schedule {
    pub fn new(mut points: Vec<SchedulePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(AllocationError::data_source("schedule contains no data points"));
        }
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(AllocationError::data_source(format!(
                "schedule value at age {} is not finite",
                bad.age
            )));
        }

        points.sort_by_key(|p| p.age);
        if let Some(pair) = points.windows(2).find(|w| w[0].age == w[1].age) {
            return Err(AllocationError::data_source(format!(
                "schedule lists age {} more than once",
                pair[0].age
            )));
        }

        Ok(Self { points })
    }

    pub fn from_pairs(pairs: &[(u32, f64)]) -> Result<Self> {
        Self::new(
            pairs
                .iter()
                .map(|&(age, value)| SchedulePoint::new(age, value))
                .collect(),
        )
    }

    pub fn points(&self) -> &[SchedulePoint] {
        &self.points
    }

    pub fn first_age(&self) -> u32 {
        self.points[0].age
    }

    pub fn last_age(&self) -> u32 {
        self.points[self.points.len() - 1].age
    }

    pub fn contains(&self, age: u32) -> bool {
        (self.first_age()..=self.last_age()).contains(&age)
    }

    pub fn evaluate(&self, age: u32) -> f64 {
        if !self.contains(age) {
            return 0.0;
        }

        let idx = self.points.partition_point(|p| p.age < age);
        let upper = self.points[idx];
        if upper.age == age {
            return upper.value;
        }

        // idx > 0 because age > first_age here.
        let lower = self.points[idx - 1];
        let span = f64::from(upper.age - lower.age);
        let weight = f64::from(age - lower.age) / span;
        lower.value + weight * (upper.value - lower.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample() -> Schedule {
        Schedule::from_pairs(&[(50, 70_000.0), (30, 50_000.0), (40, 60_000.0), (60, 80_000.0)])
            .expect("valid schedule")
    }

    #[test]
    fn exact_ages_return_supplied_values() {
        let schedule = sample();
        assert_approx(schedule.evaluate(30), 50_000.0);
        assert_approx(schedule.evaluate(40), 60_000.0);
        assert_approx(schedule.evaluate(60), 80_000.0);
    }

    #[test]
    fn interpolates_linearly_between_neighbours() {
        let schedule = sample();
        assert_approx(schedule.evaluate(35), 55_000.0);
        assert_approx(schedule.evaluate(52), 72_000.0);
    }

    #[test]
    fn ages_outside_range_are_zero() {
        let schedule = sample();
        assert_approx(schedule.evaluate(29), 0.0);
        assert_approx(schedule.evaluate(61), 0.0);
    }

    #[test]
    fn points_are_sorted_on_construction() {
        let schedule = sample();
        let ages: Vec<u32> = schedule.points().iter().map(|p| p.age).collect();
        assert_eq!(ages, vec![30, 40, 50, 60]);
    }

    #[test]
    fn empty_schedule_is_a_data_source_error() {
        let err = Schedule::new(Vec::new()).expect_err("empty must fail");
        assert!(matches!(err, AllocationError::DataSource(_)));
    }

    #[test]
    fn duplicate_age_is_rejected() {
        let err = Schedule::from_pairs(&[(30, 1.0), (30, 2.0)]).expect_err("duplicate must fail");
        assert!(matches!(err, AllocationError::DataSource(_)));
        assert!(err.to_string().contains("age 30"));
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let err = Schedule::from_pairs(&[(30, f64::NAN)]).expect_err("nan must fail");
        assert!(matches!(err, AllocationError::DataSource(_)));
    }
}
