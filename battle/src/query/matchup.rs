//! Type matchup helpers shared by the evaluator and the heuristic agents

use crate::types::Type;

/// Effectiveness floor used in place of log2(0) for immunities
pub const IMMUNE_LOG2: f64 = -2.0;

/// Whether the defender takes >1x from any of the attacking types
pub fn is_weak_to_any(defender: &[Type], attacking: &[Type]) -> bool {
    attacking
        .iter()
        .any(|t| t.effectiveness_multi(defender) > 1.0)
}

/// Whether the defender takes <1x from every attacking type
pub fn resists_all(defender: &[Type], attacking: &[Type]) -> bool {
    !attacking.is_empty()
        && attacking
            .iter()
            .all(|t| t.effectiveness_multi(defender) < 1.0)
}

pub fn is_immune_to(defender: &[Type], attacking: Type) -> bool {
    attacking.effectiveness_multi(defender) == 0.0
}

/// Every type that hits the defender super effectively
pub fn weaknesses(defender: &[Type]) -> Vec<Type> {
    Type::ALL
        .iter()
        .copied()
        .filter(|t| t.effectiveness_multi(defender) > 1.0)
        .collect()
}

/// Effectiveness on a log2 scale: 2x = 1, 0.5x = -1, immune = [`IMMUNE_LOG2`]
pub fn effectiveness_log2(attacking: Type, defender: &[Type]) -> f64 {
    let multiplier = attacking.effectiveness_multi(defender) as f64;
    if multiplier == 0.0 {
        IMMUNE_LOG2
    } else {
        multiplier.log2()
    }
}

/// Best attacking type against the defender, with its log2 effectiveness
///
/// Unknown defender types count as neutral.
pub fn best_attack(attacking: &[Type], defender: &[Type]) -> Option<(Type, f64)> {
    attacking
        .iter()
        .map(|&t| {
            let score = if defender.is_empty() {
                0.0
            } else {
                effectiveness_log2(t, defender)
            };
            (t, score)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_weak_to_any() {
        let water = [Type::Water];
        assert!(is_weak_to_any(&water, &[Type::Electric, Type::Grass]));
        assert!(!is_weak_to_any(&water, &[Type::Fire, Type::Ice]));
    }

    #[test]
    fn test_resists_all() {
        let steel = [Type::Steel];
        assert!(resists_all(&steel, &[Type::Normal, Type::Ice, Type::Fairy]));
        assert!(!resists_all(&steel, &[Type::Fire, Type::Ice]));
        assert!(!resists_all(&steel, &[]));
    }

    #[test]
    fn test_is_immune_to() {
        assert!(is_immune_to(&[Type::Ghost], Type::Normal));
        assert!(is_immune_to(&[Type::Ground], Type::Electric));
        assert!(!is_immune_to(&[Type::Ghost], Type::Dark));
    }

    #[test]
    fn test_weaknesses_dual_type() {
        // Water/Ground is only weak to Grass
        assert_eq!(weaknesses(&[Type::Water, Type::Ground]), vec![Type::Grass]);
        assert_eq!(weaknesses(&[Type::Steel]).len(), 3);
    }

    #[test]
    fn test_effectiveness_log2() {
        assert_eq!(effectiveness_log2(Type::Grass, &[Type::Water, Type::Ground]), 2.0);
        assert_eq!(effectiveness_log2(Type::Fire, &[Type::Water]), -1.0);
        assert_eq!(effectiveness_log2(Type::Normal, &[Type::Ghost]), IMMUNE_LOG2);
    }

    #[test]
    fn test_best_attack() {
        let (best, score) = best_attack(&[Type::Dragon, Type::Ground], &[Type::Steel]).unwrap();
        assert_eq!(best, Type::Ground);
        assert_eq!(score, 1.0);
        assert!(best_attack(&[], &[Type::Steel]).is_none());
        assert_eq!(best_attack(&[Type::Fire], &[]).unwrap().1, 0.0);
    }
}
