use lion_core::error::ConstructionError;
use lion_permission::{
    Arity, FilePermission, NamedPermission, Permission, PermissionConstructor, PermissionFactory,
    PermissionSet, Permissions, ALL_FILES,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_factory_built_permissions_in_collection() {
    let factory = PermissionFactory::with_builtin();
    let perms = Permissions::new();

    for (t, n, a) in [
        ("file", "/srv/data/-", "read"),
        ("property", "org.example.*", "read,write"),
        ("runtime", "exit", ""),
    ] {
        perms.add(factory.construct(t, n, a).unwrap()).unwrap();
    }

    assert!(perms.implies(&FilePermission::new("/srv/data/a/b", "read").unwrap()));
    assert!(!perms.implies(&FilePermission::new("/srv/other", "read").unwrap()));
    assert!(perms.implies(&NamedPermission::new("property", "org.example.name", "write").unwrap()));
    assert!(perms.implies(&NamedPermission::new("runtime", "exit", "").unwrap()));
    assert!(!perms.implies(&NamedPermission::new("runtime", "halt", "").unwrap()));
}

#[test]
fn test_all_files_covers_every_path() {
    let all = FilePermission::new(ALL_FILES, "read").unwrap();
    assert!(all.implies(&FilePermission::new("/etc/passwd", "read").unwrap()));
    assert!(all.implies(&FilePermission::new("relative/path", "read").unwrap()));
    assert!(!all.implies(&FilePermission::new("/etc/passwd", "write").unwrap()));
}

#[test]
fn test_custom_type_registration() {
    let factory = PermissionFactory::new();
    assert!(!factory.is_registered("topic"));
    assert_eq!(
        factory.construct("topic", "a", "publish").unwrap_err(),
        ConstructionError::UnknownType("topic".into())
    );

    factory.register(
        "topic",
        PermissionConstructor::full(|t, name, actions| Ok(Arc::new(NamedPermission::new(t, name, actions)?))),
    );
    assert_eq!(factory.arities("topic"), vec![Arity::Full]);

    let granted = factory.construct("topic", "sensors.*", "publish").unwrap();
    let wanted = factory.construct("topic", "sensors.temp", "publish").unwrap();
    assert!(granted.implies(wanted.as_ref()));
}

#[test]
fn test_concurrent_add_and_query() {
    let perms = Arc::new(Permissions::new());
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let perms = Arc::clone(&perms);
            thread::spawn(move || {
                for i in 0..50 {
                    let name = format!("/data/{}/{}", w, i);
                    perms.add(Arc::new(FilePermission::new(name, "read").unwrap())).unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(perms.len(), 200);
    assert!(perms.implies(&FilePermission::new("/data/3/49", "read").unwrap()));
}
