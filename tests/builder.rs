use lazy_dispatch::builder::{Computer, UserProfile};
use lazy_dispatch::DispatchError;

#[test]
fn test_missing_required_fails_before_setters() {
   assert_eq!(
      Computer::builder(None, Some("16GB")).err().map(|e| e.to_string()),
      Some("missing required field `cpu`".to_string())
   );
   assert!(matches!(
      Computer::builder(Some("cpuX"), None),
      Err(DispatchError::MissingRequired("ram"))
   ));
}

#[test]
fn test_defaults_apply_to_unset_fields() {
   let computer = Computer::builder(Some("cpuX"), Some("16GB")).unwrap().build();
   assert_eq!(computer.cpu(), "cpuX");
   assert_eq!(computer.ram(), "16GB");
   assert_eq!(computer.storage(), None);
   assert_eq!(computer.graphics_card(), None);
   assert_eq!(computer.operating_system(), Computer::DEFAULT_OPERATING_SYSTEM);
   assert!(!computer.bluetooth_enabled());
}

#[test]
fn test_setters_chain() {
   let computer = Computer::builder(Some("Ryzen 9"), Some("64GB"))
      .unwrap()
      .storage("2TB NVMe")
      .graphics_card("RTX 4090")
      .operating_system("Windows 11 Pro")
      .bluetooth_enabled(true)
      .build();
   assert_eq!(computer.storage(), Some("2TB NVMe"));
   assert_eq!(computer.graphics_card(), Some("RTX 4090"));
   assert_eq!(computer.operating_system(), "Windows 11 Pro");
   assert!(computer.bluetooth_enabled());
}

#[test]
fn test_build_twice_yields_equal_independent_values() {
   let builder = Computer::builder(Some("cpuX"), Some("16GB"))
      .unwrap()
      .storage("512GB SSD");
   let first = builder.build();
   let second = builder.build();
   assert_eq!(first, second);

   let third = builder.bluetooth_enabled(true).build();
   assert_ne!(first, third);
}

#[test]
fn test_display_omits_unset_parts() {
   let computer = Computer::builder(Some("cpuX"), Some("16GB")).unwrap().build();
   assert_eq!(
      computer.to_string(),
      "Computer Specs:\n  CPU: cpuX\n  RAM: 16GB\n  OS: Linux (Default)\n  Bluetooth Enabled: false\n"
   );
}

#[test]
fn test_user_profile_defaults() {
   let profile = UserProfile::builder(Some(7), Some("mei")).unwrap().build();
   assert_eq!(profile.user_id, 7);
   assert_eq!(profile.username, "mei");
   assert!(profile.active);
   assert_eq!(profile.preferred_language, UserProfile::DEFAULT_LANGUAGE);
   assert!(profile.roles.is_empty());
   assert!(profile.interests.is_empty());
   assert_eq!(profile.email, None);
}

#[test]
fn test_user_profile_setters() {
   let profile = UserProfile::builder(Some(1), Some("li"))
      .unwrap()
      .email("li@example.com")
      .full_name("Li Lei")
      .age(30)
      .avatar_url("https://example.com/li.png")
      .active(false)
      .preferred_language("en-US")
      .role("admin")
      .role("editor")
      .role("admin")
      .interest("chess")
      .interest("go")
      .build();
   assert_eq!(profile.email.as_deref(), Some("li@example.com"));
   assert_eq!(profile.full_name.as_deref(), Some("Li Lei"));
   assert_eq!(profile.age, Some(30));
   assert!(!profile.active);
   assert_eq!(profile.preferred_language, "en-US");
   assert_eq!(profile.roles.len(), 2);
   assert_eq!(profile.interests, ["chess", "go"]);
}

#[test]
fn test_user_profile_requires_id_and_name() {
   assert_eq!(
      UserProfile::builder(None, Some("li")).err(),
      Some(DispatchError::MissingRequired("user_id"))
   );
   assert_eq!(
      UserProfile::builder(Some(1), None).err(),
      Some(DispatchError::MissingRequired("username"))
   );
}
