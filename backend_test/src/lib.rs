use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject its
/// dependencies.
///
/// Injectable dependencies are a [`rocket::local::asynchronous::Client`]
/// talking to a fresh in-memory server, the `Arc<StaticRoster>` that server
/// reads eligible voter counts from, and a [`mongodb::Database`].
///
/// A test taking a `Database` gets a freshly named database with all indexes
/// in place, which is dropped regardless of how the test terminates. It is
/// skipped with a warning unless `db_uri` is configured (e.g. through
/// `ROCKET_DB_URI`).
#[proc_macro_attribute]
pub fn backend_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (test_args, has_db) = match check_sig(&item_fn.sig) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let body = if has_db {
        quote! {
            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let db = match outer_runtime.block_on(crate::test_db()) {
                Some(db) => db,
                None => {
                    log::warn!("Skipping {}: no `db_uri` configured", stringify!(#name));
                    return;
                }
            };

            // Run the test, catching any panics.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                inner_runtime.block_on(async {
                    #[allow(unused_variables)]
                    let (rocket_client, roster) = crate::test_client().await;
                    let db = db.clone();
                    #new_name(#(#test_args),*).await
                })
            }));

            // Run the cleanup.
            outer_runtime.block_on(db.drop(None)).unwrap();

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    } else {
        quote! {
            // Multiple worker threads so that concurrent requests really
            // race each other.
            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, roster) = crate::test_client().await;
                #new_name(#(#test_args),*).await
            });
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["tally_backend"],
                None,
                None,
            );

            /// The test itself.
            #item_fn

            #body
        }
    }
    .into()
}

/// Ensure the wrapped test is async, and map each parameter to the value to
/// inject for it. Also reports whether a database was requested.
fn check_sig(sig: &Signature) -> Result<(Vec<Ident>, bool), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_roster = false;
    let mut has_db = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself.
                let type_ident = &type_path.path.segments.last().unwrap().ident;
                let (seen, injected, description) = if type_ident == "Client" {
                    (&mut has_client, "rocket_client", "`rocket::local::asynchronous::Client`")
                } else if type_ident == "Arc" {
                    (&mut has_roster, "roster", "`Arc<StaticRoster>`")
                } else if type_ident == "Database" {
                    (&mut has_db, "db", "`mongodb::Database`")
                } else {
                    return Err(unexpected(input));
                };
                if *seen {
                    return Err(syn::Error::new(
                        input.span(),
                        format!("Test cannot accept more than one {description}"),
                    ));
                }
                *seen = true;
                args.push(format_ident!("{}", injected));
                continue;
            }
        }

        return Err(unexpected(input));
    }

    Ok((args, has_db))
}

fn unexpected(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `client_ident: Client`, `roster_ident: Arc<StaticRoster>` or `db_ident: Database`",
    )
}
