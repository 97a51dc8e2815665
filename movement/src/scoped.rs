/// Run `body` with one field of `state` temporarily set to `value`.
///
/// The previous value is put back once `body` returns, whatever path it returned by.
pub(crate) fn with_override<S, T, R>(
    state: &mut S,
    field: fn(&mut S) -> &mut T,
    value: T,
    body: impl FnOnce(&mut S) -> R,
) -> R {
    let previous = std::mem::replace(field(state), value);
    let result = body(state);
    *field(state) = previous;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        accel: f32,
        seen: Vec<f32>,
    }

    #[test]
    fn value_is_restored_after_early_return() {
        let mut p = Probe {
            accel: 3.0,
            seen: Vec::new(),
        };
        let out = with_override(&mut p, |p| &mut p.accel, 0.0, |p| {
            p.seen.push(p.accel);
            if p.seen.len() == 1 {
                return "early";
            }
            "late"
        });
        assert_eq!(out, "early");
        assert_eq!(p.seen, vec![0.0]);
        assert_eq!(p.accel, 3.0);
    }

    #[test]
    fn nested_overrides_unwind_in_order() {
        let mut p = Probe {
            accel: 1.0,
            seen: Vec::new(),
        };
        with_override(&mut p, |p| &mut p.accel, 2.0, |p| {
            with_override(p, |p| &mut p.accel, 3.0, |p| p.seen.push(p.accel));
            p.seen.push(p.accel);
        });
        assert_eq!(p.seen, vec![3.0, 2.0]);
        assert_eq!(p.accel, 1.0);
    }
}
