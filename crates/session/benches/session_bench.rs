use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use tribune_core::{CookieMode, RequestContext, SessionKind, SiteSettings, UserActive};
use tribune_session::{csrf, SessionManager};
use tribune_store::MemoryStore;
use tribune_users::{SaveOptions, UserChange, UserRepo};

const USERNAME: &str = "bench-user";
const PASSWORD: &str = "bench-password";

fn setup_manager(settings: SiteSettings) -> (SessionManager, Arc<SiteSettings>) {
    let settings = Arc::new(settings);
    let store = Arc::new(MemoryStore::new());
    let users = Arc::new(UserRepo::new(store, settings.clone()));

    let mut seed_ctx = RequestContext::new(&settings);
    let mut change = UserChange::new_user(USERNAME, "bench@example.net");
    change.active = Some(UserActive::Active);
    change.admin = Some(true);
    change.password = Some(PASSWORD.to_owned());
    users
        .save(&mut seed_ctx, &change, SaveOptions::default())
        .unwrap();

    (SessionManager::new(users, settings.clone()), settings)
}

/// The follow-up request a browser would send: every cookie issued during
/// `prev` moved into the cookie jar.
fn follow_up(settings: &SiteSettings, prev: &RequestContext) -> RequestContext {
    let mut next = RequestContext::new(settings);
    next.page = "read".to_owned();
    for write in &prev.cookie_writes {
        next.cookies.insert(write.name.clone(), write.value.clone());
    }
    next
}

fn bench_session_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_restore");
    group.sample_size(1000);

    // Benchmark: cookie ticket restore (one store fetch, no writes)
    group.bench_function("forum_cookie_restore", |b| {
        let (manager, settings) = setup_manager(SiteSettings::default());
        let mut login_ctx = RequestContext::new(&settings);
        manager.login(&mut login_ctx, USERNAME, PASSWORD).unwrap();
        let template = follow_up(&settings, &login_ctx);

        b.iter(|| {
            let mut ctx = template.clone();
            black_box(manager.restore(&mut ctx, SessionKind::Forum).unwrap());
        });
    });

    // Benchmark: restore with the short-term identifier checked as well
    group.bench_function("tight_security_restore", |b| {
        let (manager, settings) = setup_manager(SiteSettings {
            tight_security: true,
            ..SiteSettings::default()
        });
        let mut login_ctx = RequestContext::new(&settings);
        manager.login(&mut login_ctx, USERNAME, PASSWORD).unwrap();
        let template = follow_up(&settings, &login_ctx);

        b.iter(|| {
            let mut ctx = template.clone();
            black_box(manager.restore(&mut ctx, SessionKind::Forum).unwrap());
        });
    });

    // Benchmark: ticket carried in the URI instead of a cookie
    group.bench_function("uri_ticket_restore", |b| {
        let (manager, settings) = setup_manager(SiteSettings {
            cookie_mode: CookieMode::Disabled,
            ..SiteSettings::default()
        });
        let mut login_ctx = RequestContext::new(&settings);
        manager.login(&mut login_ctx, USERNAME, PASSWORD).unwrap();
        let mut template = RequestContext::new(&settings);
        template.uri_args = login_ctx.uri_out.clone();

        b.iter(|| {
            let mut ctx = template.clone();
            black_box(manager.restore(&mut ctx, SessionKind::Forum).unwrap());
        });
    });

    // Benchmark: derived admin ticket verification
    group.bench_function("admin_cookie_restore", |b| {
        let (manager, settings) = setup_manager(SiteSettings::default());
        let mut login_ctx = RequestContext::new(&settings);
        manager
            .admin_login(&mut login_ctx, USERNAME, PASSWORD)
            .unwrap();
        let template = follow_up(&settings, &login_ctx);

        b.iter(|| {
            let mut ctx = template.clone();
            black_box(manager.restore(&mut ctx, SessionKind::Admin).unwrap());
        });
    });

    group.finish();
}

fn bench_posting_token(c: &mut Criterion) {
    let mut group = c.benchmark_group("posting_token");

    let (manager, settings) = setup_manager(SiteSettings::default());
    let mut login_ctx = RequestContext::new(&settings);
    login_ctx.page = "post".to_owned();
    manager.login(&mut login_ctx, USERNAME, PASSWORD).unwrap();

    for page_len in [8, 64, 512].iter() {
        group.throughput(Throughput::Bytes(*page_len as u64));
        group.bench_with_input(
            BenchmarkId::new("derive_for_page_len", page_len),
            page_len,
            |b, &len| {
                let page = "p".repeat(len);
                b.iter(|| {
                    black_box(csrf::token_for(
                        &login_ctx,
                        &settings,
                        Some(black_box(&page)),
                    ));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_session_restore, bench_posting_token);
criterion_main!(benches);
