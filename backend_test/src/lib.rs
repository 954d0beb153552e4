use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the database and image directory are removed regardless of
/// how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], and [`crate::model::mongodb::Coll<T>`].
///
/// Passing `open` (i.e. `#[backend_test(open)]`) schedules a voting window
/// around the current time before the test body runs.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (test_args, collection_idents, collection_types) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Open voting if requested.
    let maybe_open = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "open" => quote! {
            let now = chrono::Utc::now();
            crate::model::db::settings::Settings::store_window(
                &crate::model::mongodb::Coll::from_db(&db),
                Some(now - chrono::Duration::hours(1)),
                Some(now + chrono::Duration::hours(1)),
            )
            .await
            .unwrap();
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `open` or nothing")
                .into_compile_error()
                .into();
        }
        None => TokenStream2::new(),
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                mongodb::Database,
                std::path::PathBuf,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["livevote_backend"],
                    None,
                    None,
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::build())
                    .await
                    .unwrap();
                let db = rocket_client
                    .rocket()
                    .state::<mongodb::Database>()
                    .unwrap()
                    .clone();
                let image_dir = rocket_client
                    .rocket()
                    .state::<crate::images::ImageStore>()
                    .unwrap()
                    .dir()
                    .to_path_buf();

                #maybe_open

                (rocket_client, db, image_dir)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database, image_dir: std::path::PathBuf) {
                crate::config::discard_test_state(db, image_dir).await;
            }

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
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, db, image_dir) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                )*

                runtime.block_on(#new_name(#(#test_args),* #(,#collection_idents)*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db, image_dir));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
#[allow(clippy::type_complexity)]
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, Vec<Ident>, Vec<Ident>), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_db = false;
    let mut args = vec![];
    let mut collection_idents = vec![];
    let mut collection_types = vec![];

    for input in &sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new(input.span(), "Test cannot take `self`"));
        };
        let (Pat::Ident(pat_ident), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) else {
            return Err(unexpected_arg(input));
        };

        if let Some(type_ident) = type_path.path.get_ident() {
            if type_ident == "Client" {
                if has_client {
                    return Err(syn::Error::new(
                        input.span(),
                        "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                    ));
                }
                has_client = true;
                args.push(quote! { rocket_client });
                continue;
            } else if type_ident == "Database" {
                if has_db {
                    return Err(syn::Error::new(
                        input.span(),
                        "Test cannot accept more than one `mongodb::Database`",
                    ));
                }
                has_db = true;
                args.push(quote! { db });
                continue;
            }
        } else if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Coll" {
                if let PathArguments::AngleBracketed(generics) = &segment.arguments {
                    if let Some(GenericArgument::Type(Type::Path(inner))) = generics.args.first() {
                        if let Some(inner_ident) = inner.path.get_ident() {
                            collection_idents.push(pat_ident.ident.clone());
                            collection_types.push(inner_ident.clone());
                            continue;
                        }
                    }
                }
            }
        }

        return Err(unexpected_arg(input));
    }

    Ok((args, collection_idents, collection_types))
}

fn unexpected_arg(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `client_ident: Client`, `db_ident: Database` or `collection_ident: Coll<T>`",
    )
}
