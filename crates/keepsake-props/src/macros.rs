//! Field-list declarations.

/// Implement [`Persistable`](crate::Persistable) from an annotated field list.
///
/// Each entry reads `field: "Name" => kind`, where `kind` is one of
/// `scalar`, `read_only`, `array`, `object`, `reference`, `list` or
/// `shared_list`. An optional `identity = field` names an
/// `Option<RefKey>` field returned from `reference_key`.
///
/// ```ignore
/// #[derive(Default)]
/// struct Counter {
///     key: Option<RefKey>,
///     count: u32,
///     label: String,
/// }
///
/// persistable! {
///     Counter as "Counter", identity = key {
///         count: "Count" => scalar,
///         label: "Label" => scalar,
///     }
/// }
/// ```
#[macro_export]
macro_rules! persistable {
    (@prop $props:ident, $field:ident, $name:literal, scalar) => {
        $props.scalar($name, |o| o.$field.clone(), |o, v| o.$field = v);
    };
    (@prop $props:ident, $field:ident, $name:literal, read_only) => {
        $props.read_only($name, |o| o.$field.clone());
    };
    (@prop $props:ident, $field:ident, $name:literal, array) => {
        $props.array($name, |o| o.$field.clone(), |o, v| o.$field = v);
    };
    (@prop $props:ident, $field:ident, $name:literal, object) => {
        $props.object($name, |o| &o.$field, |o| &mut o.$field);
    };
    (@prop $props:ident, $field:ident, $name:literal, reference) => {
        $props.reference($name, |o| o.$field.clone(), |o, v| o.$field = v);
    };
    (@prop $props:ident, $field:ident, $name:literal, list) => {
        $props.list($name, |o| &o.$field, |o| &mut o.$field);
    };
    (@prop $props:ident, $field:ident, $name:literal, shared_list) => {
        $props.shared_list($name, |o| o.$field.clone(), |o, v| o.$field = v);
    };
    (
        $ty:ty as $class:literal $(, identity = $key:ident)? {
            $($field:ident : $name:literal => $kind:ident),* $(,)?
        }
    ) => {
        impl $crate::Persistable for $ty {
            fn class_name(&self) -> &str {
                $class
            }

            #[allow(clippy::clone_on_copy)]
            fn declare(&self, decl: &mut $crate::Declaration) {
                #[allow(unused_mut, unused_variables)]
                let mut props = decl.of::<$ty>();
                $( $crate::persistable!(@prop props, $field, $name, $kind); )*
            }

            $(
                fn reference_key(&self) -> ::std::option::Option<$crate::RefKey> {
                    self.$key.clone()
                }
            )?
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{shared, Accessor, PropertiesAnalyzer, PropertyKind, RefKey, Shared, SharedObject};
    use keepsake_tree::{ScalarKind, Value};

    #[derive(Default)]
    struct Leaf {
        on: bool,
    }

    persistable! {
        Leaf as "Leaf" {
            on: "on" => scalar,
        }
    }

    #[derive(Default)]
    struct Branch {
        key: Option<RefKey>,
        version: u16,
        name: String,
        samples: Vec<i32>,
        leaf: Leaf,
        leaves: Vec<Leaf>,
        next: Option<Shared<Branch>>,
        all: Vec<Shared<Leaf>>,
    }

    persistable! {
        Branch as "Branch", identity = key {
            version: "version" => read_only,
            name: "name" => scalar,
            samples: "samples" => array,
            leaf: "leaf" => object,
            leaves: "leaves" => list,
            next: "next" => reference,
            all: "all" => shared_list,
        }
    }

    struct Bare;

    persistable! {
        Bare as "Bare" {}
    }

    #[test]
    fn macro_declares_fields_in_order() {
        let set = PropertiesAnalyzer::new().analyze(&Branch::default()).unwrap();
        let kinds: Vec<_> = set.iter().map(|d| (d.name(), d.kind())).collect();
        assert_eq!(
            kinds,
            [
                ("version", PropertyKind::Scalar(ScalarKind::U16)),
                ("name", PropertyKind::Scalar(ScalarKind::Text)),
                ("samples", PropertyKind::Array(ScalarKind::I32)),
                ("leaf", PropertyKind::Object),
                ("leaves", PropertyKind::List),
                ("next", PropertyKind::Reference),
                ("all", PropertyKind::SharedList),
            ]
        );
        assert!(set.get("version").unwrap().is_read_only());
    }

    #[test]
    fn identity_field_becomes_reference_key() {
        use crate::Persistable;

        let branch = Branch {
            key: Some(RefKey::new("B", 4)),
            ..Branch::default()
        };
        assert_eq!(branch.reference_key(), Some(RefKey::new("B", 4)));
        assert_eq!(Leaf::default().reference_key(), None);
        assert_eq!(branch.class_name(), "Branch");
    }

    #[test]
    fn macro_accessors_reach_fields() {
        let mut branch = Branch::default();
        let set = PropertiesAnalyzer::new().analyze(&branch).unwrap();

        let Accessor::Object(leaf) = set.get("leaf").unwrap().accessor() else {
            panic!("leaf is an object");
        };
        let inner = PropertiesAnalyzer::new()
            .analyze(leaf.get(&branch).unwrap())
            .unwrap();
        let Accessor::Scalar(on) = inner.get("on").unwrap().accessor() else {
            panic!("on is a scalar");
        };
        on.set(leaf.get_mut(&mut branch).unwrap(), Value::Bool(true))
            .unwrap();
        assert!(branch.leaf.on);

        let Accessor::SharedList(all) = set.get("all").unwrap().accessor() else {
            panic!("all is a shared list");
        };
        let first = shared(Leaf::default());
        all.set(&mut branch, vec![first.clone() as SharedObject, all.create()])
            .unwrap();
        assert_eq!(branch.all.len(), 2);
        assert!(std::rc::Rc::ptr_eq(&branch.all[0], &first));
    }

    #[test]
    fn empty_field_list_is_valid() {
        let set = PropertiesAnalyzer::new().analyze(&Bare).unwrap();
        assert!(set.is_empty());
    }
}
