//! Authoritative movement reconciliation.
//!
//! The server recomputes every moving entity's position on a fixed tick and
//! pushes the result back to the client, overriding whatever the client
//! believes locally. The whole computation lives in [`step`], a pure function
//! of its inputs, so the same code path can be replayed for validation.

use shared::{Vec3, ARRIVAL_THRESHOLD};

/// Advances a position toward a target at the given speed over `dt` seconds.
///
/// Returns the next position and whether the entity has arrived. On arrival
/// the result is snapped exactly onto `target`: either the candidate step
/// landed within [`ARRIVAL_THRESHOLD`] of it, or the step would have carried
/// the entity past it (the dot-product guard catches overshoot and direction
/// reversal, including the degenerate case where position already equals
/// target and the direction is the zero vector).
pub fn step(position: Vec3, target: Vec3, speed: f32, dt: f32) -> (Vec3, bool) {
    let to_target = target.sub(&position);
    let direction = to_target.normalize();
    let candidate = position.add(&direction.scale(speed * dt));

    if candidate.distance(&target) < ARRIVAL_THRESHOLD || to_target.dot(&direction) <= 0.0 {
        (target, true)
    } else {
        (candidate, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::MOVE_SPEED;

    #[test]
    fn test_single_step_advances_toward_target() {
        let start = Vec3::default();
        let target = Vec3::new(10.0, 0.0, 0.0);

        let (next, arrived) = step(start, target, MOVE_SPEED, 0.2);

        assert!(!arrived);
        assert_approx_eq!(next.x, 0.2);
        assert_approx_eq!(next.y, 0.0);
        assert_approx_eq!(next.z, 0.0);
    }

    #[test]
    fn test_convergence_in_bounded_steps() {
        let target = Vec3::new(10.0, 0.0, 0.0);
        let dt = 0.2;
        let mut position = Vec3::default();
        let mut steps = 0;

        // distance / (speed * dt) = 50 ticks, plus one snapping tick.
        let bound = (10.0 / (MOVE_SPEED * dt)).ceil() as u32 + 2;

        loop {
            let (next, arrived) = step(position, target, MOVE_SPEED, dt);
            assert!(next.x >= position.x, "position must not regress");
            position = next;
            steps += 1;
            if arrived {
                break;
            }
            assert!(steps < bound, "did not converge within {} steps", bound);
        }

        assert_eq!(position, target);
    }

    #[test]
    fn test_overshoot_snaps_to_target() {
        let start = Vec3::default();
        let target = Vec3::new(1.0, 0.0, 0.0);

        // One step at this dt would travel 5 units past the target.
        let (next, arrived) = step(start, target, MOVE_SPEED, 6.0);

        assert!(arrived);
        assert_eq!(next, target);
    }

    #[test]
    fn test_zero_distance_arrives_immediately() {
        let position = Vec3::new(4.0, 5.0, 6.0);

        let (next, arrived) = step(position, position, MOVE_SPEED, 0.2);

        assert!(arrived);
        assert_eq!(next, position);
        assert!(!next.x.is_nan() && !next.y.is_nan() && !next.z.is_nan());
    }

    #[test]
    fn test_arrival_threshold() {
        let target = Vec3::new(1.0, 0.0, 0.0);
        let position = Vec3::new(1.0 - 0.205, 0.0, 0.0);

        // The candidate lands 0.005 from the target, inside the threshold.
        let (next, arrived) = step(position, target, MOVE_SPEED, 0.2);

        assert!(arrived);
        assert_eq!(next, target);
    }

    #[test]
    fn test_deterministic() {
        let position = Vec3::new(1.5, -2.0, 0.25);
        let target = Vec3::new(-3.0, 4.0, 9.0);

        let a = step(position, target, MOVE_SPEED, 0.2);
        let b = step(position, target, MOVE_SPEED, 0.2);

        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_diagonal_convergence() {
        let target = Vec3::new(3.0, 4.0, 0.0);
        let mut position = Vec3::default();

        let mut steps = 0;
        loop {
            let (next, arrived) = step(position, target, 2.5, 0.2);
            position = next;
            steps += 1;
            if arrived {
                break;
            }
            assert!(steps < 20);
        }

        // 5 units at 0.5 units per tick.
        assert_eq!(position, target);
        assert!(steps >= 9);
    }
}
