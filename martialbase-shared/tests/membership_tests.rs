/// Organisation membership, deletion guards, hierarchy and access checks
///
/// Skipped when DATABASE_URL is not set.

mod common;

use martialbase_shared::auth::authorization::{
    check_organisation_admin_access, check_organisation_member_access,
};
use martialbase_shared::auth::roles::UserRole;
use martialbase_shared::db::unit_of_work::UnitOfWork;
use martialbase_shared::error::{ForbiddenCode, MartialBaseError};
use martialbase_shared::models::{
    organisation::Organisation, organisation_person::OrganisationPerson, person::Person,
    school::School, school_student::SchoolStudent,
};
use martialbase_shared::services::{hierarchy, organisations, schools};
use uuid::Uuid;

#[tokio::test]
async fn test_add_organisation_person_is_idempotent() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let org = common::organisation(&mut *conn, None).await;
    let person = common::person(&mut *conn).await;

    organisations::add_organisation_person(&mut *conn, org.id, person.id, false)
        .await
        .unwrap();
    organisations::add_organisation_person(&mut *conn, org.id, person.id, false)
        .await
        .unwrap();

    let rows = OrganisationPerson::list_for_person(&mut *conn, person.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_admin);

    let updated = organisations::add_organisation_person(&mut *conn, org.id, person.id, true)
        .await
        .unwrap();
    assert!(updated.is_admin);

    let rows = OrganisationPerson::list_for_person(&mut *conn, person.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_admin);
}

#[tokio::test]
async fn test_add_organisation_person_unknown_ids() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let org = common::organisation(&mut *conn, None).await;
    let missing = Uuid::new_v4();

    let err = organisations::add_organisation_person(&mut *conn, org.id, missing, false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("Person ID '{}' not found.", missing));

    let person = common::person(&mut *conn).await;
    let err = organisations::add_organisation_person(&mut *conn, missing, person.id, false)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Organisation ID '{}' not found.", missing)
    );
}

#[tokio::test]
async fn test_remove_last_membership_is_orphan() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let org = common::organisation(&mut *conn, None).await;
    let person = common::member(&mut *conn, org.id, false).await;

    let err = organisations::remove_organisation_person(&mut *conn, org.id, person.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MartialBaseError::OrphanPersonEntity { person_id, organisation_id }
            if person_id == person.id && organisation_id == org.id
    ));

    assert!(OrganisationPerson::find(&mut *conn, org.id, person.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_remove_membership_when_person_has_another() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let first = common::organisation(&mut *conn, None).await;
    let second = common::organisation(&mut *conn, None).await;
    let person = common::member(&mut *conn, first.id, false).await;
    OrganisationPerson::upsert(&mut *conn, second.id, person.id, false)
        .await
        .unwrap();

    let school = common::school(&mut *conn, first.id).await;
    SchoolStudent::upsert(&mut *conn, school.id, person.id, false, false)
        .await
        .unwrap();

    organisations::remove_organisation_person(&mut *conn, first.id, person.id)
        .await
        .unwrap();

    assert_eq!(
        OrganisationPerson::count_for_person(&mut *conn, person.id)
            .await
            .unwrap(),
        1
    );
    assert!(SchoolStudent::find(&mut *conn, school.id, person.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_head_instructor_cannot_leave_the_organisation() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let home = common::organisation(&mut *conn, None).await;
    let other = common::organisation(&mut *conn, None).await;
    let head = common::member(&mut *conn, home.id, false).await;
    OrganisationPerson::upsert(&mut *conn, other.id, head.id, false)
        .await
        .unwrap();
    let school = common::school(&mut *conn, home.id).await;
    schools::change_school_head_instructor(&mut *conn, school.id, head.id, false)
        .await
        .unwrap();

    let err = organisations::remove_organisation_person(&mut *conn, home.id, head.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MartialBaseError::Validation(_)));

    let stored = School::find_by_id(&mut *conn, school.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.head_instructor_id, Some(head.id));
    assert!(SchoolStudent::find(&mut *conn, school.id, head.id)
        .await
        .unwrap()
        .is_some());
    assert!(OrganisationPerson::find(&mut *conn, home.id, head.id)
        .await
        .unwrap()
        .is_some());

    // Leaving an organisation whose schools they do not head still works
    organisations::remove_organisation_person(&mut *conn, other.id, head.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_organisation_with_sole_member_fails_intact() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let org = common::organisation(&mut *conn, None).await;
    let other = common::organisation(&mut *conn, None).await;
    let sole = common::member(&mut *conn, org.id, true).await;
    let shared = common::member(&mut *conn, org.id, false).await;
    OrganisationPerson::upsert(&mut *conn, other.id, shared.id, false)
        .await
        .unwrap();
    common::school(&mut *conn, org.id).await;

    let err = organisations::delete_organisation(&mut *conn, org.id)
        .await
        .unwrap_err();

    // Person check runs before the school check
    assert!(matches!(
        err,
        MartialBaseError::OrphanPersonEntity { person_id, .. } if person_id == sole.id
    ));

    assert!(Organisation::exists(&mut *conn, org.id).await.unwrap());
    assert_eq!(
        OrganisationPerson::list_for_organisation(&mut *conn, org.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_delete_organisation_with_school_fails() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let org = common::organisation(&mut *conn, None).await;
    let school = common::school(&mut *conn, org.id).await;

    let err = organisations::delete_organisation(&mut *conn, org.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MartialBaseError::OrphanSchoolEntity { school_id, organisation_id }
            if school_id == school.id && organisation_id == org.id
    ));
    assert!(Organisation::exists(&mut *conn, org.id).await.unwrap());
}

#[tokio::test]
async fn test_delete_organisation_keeps_members_with_other_homes() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let org = common::organisation(&mut *conn, None).await;
    let other = common::organisation(&mut *conn, None).await;
    let person = common::member(&mut *conn, other.id, false).await;
    OrganisationPerson::upsert(&mut *conn, org.id, person.id, true)
        .await
        .unwrap();

    organisations::delete_organisation(&mut *conn, org.id)
        .await
        .unwrap();

    assert!(!Organisation::exists(&mut *conn, org.id).await.unwrap());
    assert!(Person::exists(&mut *conn, person.id).await.unwrap());
    assert_eq!(
        OrganisationPerson::count_for_person(&mut *conn, person.id)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_reparent_reports_first_organisation_not_administered() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let old_parent = common::organisation(&mut *conn, None).await;
    let child = common::organisation(&mut *conn, Some(old_parent.id)).await;
    let new_parent = common::organisation(&mut *conn, None).await;
    let admin = common::member(&mut *conn, old_parent.id, true).await;
    let caller = common::caller(admin.id, &[UserRole::OrganisationAdmin]);

    // Admin of the old parent only: the child is reported
    let err = hierarchy::change_organisation_parent(&mut *conn, &caller, child.id, new_parent.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MartialBaseError::Forbidden { code: ForbiddenCode::NotOrganisationAdmin, organisation_id }
            if organisation_id == Some(child.id)
    ));

    // Admin of old parent and child: the new parent is reported
    OrganisationPerson::upsert(&mut *conn, child.id, admin.id, true)
        .await
        .unwrap();
    let err = hierarchy::change_organisation_parent(&mut *conn, &caller, child.id, new_parent.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MartialBaseError::Forbidden { code: ForbiddenCode::NotOrganisationAdmin, organisation_id }
            if organisation_id == Some(new_parent.id)
    ));

    // Admin of all three: moved
    OrganisationPerson::upsert(&mut *conn, new_parent.id, admin.id, true)
        .await
        .unwrap();
    let moved = hierarchy::change_organisation_parent(&mut *conn, &caller, child.id, new_parent.id)
        .await
        .unwrap();
    assert_eq!(moved.parent_id, Some(new_parent.id));
}

#[tokio::test]
async fn test_reparent_checks_old_parent_first() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let old_parent = common::organisation(&mut *conn, None).await;
    let child = common::organisation(&mut *conn, Some(old_parent.id)).await;
    let new_parent = common::organisation(&mut *conn, None).await;
    let admin = common::member(&mut *conn, child.id, true).await;
    OrganisationPerson::upsert(&mut *conn, new_parent.id, admin.id, true)
        .await
        .unwrap();
    let caller = common::caller(admin.id, &[UserRole::OrganisationAdmin]);

    let err = hierarchy::change_organisation_parent(&mut *conn, &caller, child.id, new_parent.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MartialBaseError::Forbidden { code: ForbiddenCode::NotOrganisationAdmin, organisation_id }
            if organisation_id == Some(old_parent.id)
    ));
}

#[tokio::test]
async fn test_reparent_under_descendant_is_rejected() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let root = common::organisation(&mut *conn, None).await;
    let grandchild_parent = common::organisation(&mut *conn, Some(root.id)).await;
    let grandchild = common::organisation(&mut *conn, Some(grandchild_parent.id)).await;
    let someone = common::person(&mut *conn).await;
    let caller = common::caller(someone.id, &[UserRole::Thanos]);

    let err = hierarchy::change_organisation_parent(&mut *conn, &caller, root.id, grandchild.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MartialBaseError::Validation(_)));

    let ancestors = Organisation::ancestors(&mut *conn, grandchild.id)
        .await
        .unwrap();
    let ids: Vec<Uuid> = ancestors.iter().map(|org| org.id).collect();
    assert_eq!(ids, vec![grandchild_parent.id, root.id]);
}

#[tokio::test]
async fn test_remove_parent() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let parent = common::organisation(&mut *conn, None).await;
    let child = common::organisation(&mut *conn, Some(parent.id)).await;
    let admin = common::member(&mut *conn, parent.id, true).await;
    OrganisationPerson::upsert(&mut *conn, child.id, admin.id, true)
        .await
        .unwrap();
    let caller = common::caller(admin.id, &[UserRole::OrganisationAdmin]);

    let detached = hierarchy::remove_organisation_parent(&mut *conn, &caller, child.id)
        .await
        .unwrap();
    assert_eq!(detached.parent_id, None);

    let children = Organisation::children(&mut *conn, parent.id).await.unwrap();
    assert!(children.is_empty());
}

#[tokio::test]
async fn test_remove_missing_parent_needs_member_access() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let home = common::organisation(&mut *conn, None).await;
    let private = common::organisation(&mut *conn, None).await;
    let outsider = common::member(&mut *conn, home.id, false).await;
    let caller = common::caller(outsider.id, &[UserRole::OrganisationMember]);

    let err = hierarchy::remove_organisation_parent(&mut *conn, &caller, private.id)
        .await
        .unwrap_err();
    assert_eq!(err.forbidden_code(), Some(ForbiddenCode::NoOrganisationAccess));

    let member = common::member(&mut *conn, private.id, false).await;
    let caller = common::caller(member.id, &[UserRole::OrganisationMember]);
    let unchanged = hierarchy::remove_organisation_parent(&mut *conn, &caller, private.id)
        .await
        .unwrap();
    assert_eq!(unchanged.id, private.id);
    assert_eq!(unchanged.parent_id, None);
}

#[tokio::test]
async fn test_admin_access_check_sequence() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let org = common::organisation(&mut *conn, None).await;
    let member = common::member(&mut *conn, org.id, false).await;

    // Missing organisation wins over everything, even the super-role
    let thanos = common::caller(member.id, &[UserRole::Thanos]);
    let missing = Uuid::new_v4();
    let err = check_organisation_admin_access(&mut *conn, &thanos, missing)
        .await
        .unwrap_err();
    assert!(matches!(err, MartialBaseError::NotFound { .. }));

    check_organisation_admin_access(&mut *conn, &thanos, org.id)
        .await
        .unwrap();

    let no_roles = common::caller(member.id, &[]);
    let err = check_organisation_admin_access(&mut *conn, &no_roles, org.id)
        .await
        .unwrap_err();
    assert_eq!(err.forbidden_code(), Some(ForbiddenCode::InsufficientUserRole));

    let mut unregistered = common::caller(member.id, &[UserRole::OrganisationMember]);
    unregistered.person_id = None;
    let err = check_organisation_admin_access(&mut *conn, &unregistered, org.id)
        .await
        .unwrap_err();
    assert_eq!(err.forbidden_code(), Some(ForbiddenCode::AzureUserNotRegistered));

    let plain = common::caller(member.id, &[UserRole::OrganisationMember]);
    let err = check_organisation_admin_access(&mut *conn, &plain, org.id)
        .await
        .unwrap_err();
    assert_eq!(err.forbidden_code(), Some(ForbiddenCode::NotOrganisationAdmin));

    check_organisation_member_access(&mut *conn, &plain, org.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_member_access_to_public_and_private_organisations() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();

    let home = common::organisation(&mut *conn, None).await;
    let private = common::organisation(&mut *conn, None).await;
    let outsider = common::member(&mut *conn, home.id, false).await;
    let caller = common::caller(outsider.id, &[UserRole::OrganisationMember]);

    let err = check_organisation_member_access(&mut *conn, &caller, private.id)
        .await
        .unwrap_err();
    assert_eq!(err.forbidden_code(), Some(ForbiddenCode::NoOrganisationAccess));

    sqlx::query("UPDATE organisations SET is_public = TRUE WHERE id = $1")
        .bind(private.id)
        .execute(&mut *conn)
        .await
        .unwrap();

    check_organisation_member_access(&mut *conn, &caller, private.id)
        .await
        .unwrap();
}

fn new_organisation(name: &str) -> organisations::NewOrganisation {
    organisations::NewOrganisation {
        initials: "NEW".to_string(),
        name: format!("{} {}", name, Uuid::new_v4()),
        is_public: false,
        parent_id: None,
        address: None,
        admin: None,
    }
}

#[tokio::test]
async fn test_create_organisation_makes_creator_admin() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();
    let creator = common::person(&mut *conn).await;

    let created =
        organisations::create_organisation(&mut *conn, &new_organisation("Founded"), Some(creator.id))
            .await
            .unwrap();

    assert!(created.admin.is_none());
    let membership = OrganisationPerson::find(&mut *conn, created.organisation.id, creator.id)
        .await
        .unwrap()
        .unwrap();
    assert!(membership.is_admin);
}

#[tokio::test]
async fn test_create_organisation_without_any_admin_is_refused() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let conn = uow.conn();
    let new_org = new_organisation("Unmanaged");

    let err = organisations::create_organisation(&mut *conn, &new_org, None)
        .await
        .unwrap_err();

    assert!(matches!(err, MartialBaseError::Validation(_)));
    let all = Organisation::list_all(&mut *conn).await.unwrap();
    assert!(all.iter().all(|org| org.name != new_org.name));
}
