//! Property tests for override resolution

use super::*;
use proptest::prelude::*;
use serde_json::json;

fn base() -> ModelConfig<()> {
    ModelConfig::new((), ["x"], ["y"])
}

fn arb_trainer_field() -> impl Strategy<Value = (String, serde_json::Value)> {
    prop_oneof![
        (1usize..50).prop_map(|v| ("max_epochs".to_string(), json!(v))),
        (1usize..8).prop_map(|v| ("accumulate_grad_batches".to_string(), json!(v))),
        any::<bool>().prop_map(|v| ("logger".to_string(), json!(v))),
        "[a-z]{1,8}".prop_map(|v| ("accelerator".to_string(), json!(v))),
    ]
}

fn arb_unknown_field() -> impl Strategy<Value = String> {
    "zz_[a-z]{1,10}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_partial_touches_only_named_fields(
        fields in prop::collection::vec(arb_trainer_field(), 1..4)
    ) {
        let original = base();
        let mut object = serde_json::Map::new();
        for (key, value) in &fields {
            object.insert(key.clone(), value.clone());
        }
        let out = ConfigOverrides::new()
            .trainer(Override::fields(serde_json::Value::Object(object.clone())))
            .apply(&original)
            .unwrap();

        let before = serde_json::to_value(&original.trainer).unwrap();
        let after = serde_json::to_value(&out.trainer).unwrap();
        for (key, value) in after.as_object().unwrap() {
            let expected = object.get(key).unwrap_or(&before[key]);
            prop_assert_eq!(value, expected);
        }
        prop_assert_eq!(&out.datamodule, &original.datamodule);
        prop_assert_eq!(&out.optimizer, &original.optimizer);
        prop_assert_eq!(original, base());
    }

    #[test]
    fn prop_unknown_field_fails_without_result(name in arb_unknown_field(), epochs in 1usize..9) {
        let original = base();
        let result = ConfigOverrides::new()
            .datamodule(Override::fields(json!({"seed": 4})))
            .trainer(Override::fields(json!({ name: epochs })))
            .apply(&original);
        prop_assert!(matches!(result, Err(crate::Error::ConfigOverride(_))));
        prop_assert_eq!(original, base());
    }

    #[test]
    fn prop_keep_is_identity(seed in any::<u64>(), batch in 1usize..64) {
        let mut original = base();
        original.datamodule.seed = seed;
        original.datamodule.train.batch_size = batch;
        let out = ConfigOverrides::new().apply(&original).unwrap();
        prop_assert_eq!(out, original);
    }
}
